use std::collections::HashMap;

use crate::models::shared::ReactionCount;

/// One reaction row: `(subject id, emoji, user id)`.
pub(super) type ReactionRow = (String, String, String);

/// Fold reaction rows into per-subject counts.
///
/// Rows must arrive oldest first; emojis keep the order in which they were
/// first used on each subject.
pub(super) fn aggregate(
    rows: impl IntoIterator<Item = ReactionRow>,
    viewer: Option<&str>,
) -> HashMap<String, Vec<ReactionCount>> {
    let mut out: HashMap<String, Vec<ReactionCount>> = HashMap::new();
    for (subject, emoji, user_id) in rows {
        let reacted = viewer == Some(user_id.as_str());
        let counts = out.entry(subject).or_default();
        match counts.iter_mut().find(|c| c.emoji == emoji) {
            Some(c) => {
                c.count += 1;
                c.reacted |= reacted;
            }
            None => counts.push(ReactionCount {
                emoji,
                count: 1,
                reacted,
            }),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(subject: &str, emoji: &str, user: &str) -> ReactionRow {
        (subject.into(), emoji.into(), user.into())
    }

    #[test]
    fn counts_per_subject_in_first_use_order() {
        let rows = vec![
            row("p1", "👍", "a"),
            row("p1", "🔥", "b"),
            row("p1", "👍", "me"),
            row("p2", "🔥", "a"),
        ];
        let agg = aggregate(rows, Some("me"));
        assert_eq!(
            agg["p1"],
            vec![
                ReactionCount { emoji: "👍".into(), count: 2, reacted: true },
                ReactionCount { emoji: "🔥".into(), count: 1, reacted: false },
            ]
        );
        assert_eq!(agg["p2"].len(), 1);
        assert!(!agg["p2"][0].reacted);
    }
}
