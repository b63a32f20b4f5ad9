//! Keyset pagination over `(sort_key, id)`.
//!
//! Forward pages walk newest first: `ORDER BY sort_key DESC, id DESC` with
//! `(sort_key, id) < cursor`. Backward pages run the opposite order with
//! `(sort_key, id) > cursor` and are reversed before they are returned, so a
//! page always reads newest first. One extra row is fetched to learn whether
//! the walk can continue.

use common::Cursor;
use sea_orm::sea_query::IntoCondition;
use sea_orm::{ColumnTrait, Condition, EntityTrait, Order, QueryFilter, QueryOrder, QuerySelect, Select};

use crate::config::PaginationConfig;
use crate::error::AppError;
use crate::models::shared::{Page, PageArgs, PageInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// Validated pagination request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub direction: Direction,
    pub size: u64,
    pub cursor: Option<Cursor>,
}

impl PageRequest {
    pub fn parse(args: &PageArgs, config: &PaginationConfig) -> Result<Self, AppError> {
        if args.first.is_some() && args.last.is_some() {
            return Err(AppError::invalid("first and last cannot be set together"));
        }
        if args.after.is_some() && args.before.is_some() {
            return Err(AppError::invalid("after and before cannot be set together"));
        }

        let backward = args.last.is_some() || (args.first.is_none() && args.before.is_some());
        let (direction, size, raw_cursor, field) = if backward {
            (Direction::Backward, args.last, args.before.as_deref(), "last")
        } else {
            (Direction::Forward, args.first, args.after.as_deref(), "first")
        };

        // A cursor pointing the other way is a client bug.
        if (backward && args.after.is_some()) || (!backward && args.before.is_some()) {
            return Err(AppError::invalid(format!("{field} cannot be combined with that cursor")));
        }

        let size = size.unwrap_or(config.default_page_size);
        if size < 1 || size > config.max_page_size {
            return Err(AppError::invalid_field(
                field,
                format!("{field} must be between 1 and {}", config.max_page_size),
            ));
        }

        let cursor = raw_cursor.map(Cursor::decode).transpose()?;
        Ok(Self {
            direction,
            size,
            cursor,
        })
    }

    pub fn forward(size: u64) -> Self {
        Self {
            direction: Direction::Forward,
            size,
            cursor: None,
        }
    }

    fn order(&self) -> Order {
        match self.direction {
            Direction::Forward => Order::Desc,
            Direction::Backward => Order::Asc,
        }
    }

    /// Apply a `(time, id)` keyset to `select`.
    pub fn apply_timed<E, C>(&self, select: Select<E>, time: C, id: C) -> Result<Select<E>, AppError>
    where
        E: EntityTrait,
        C: ColumnTrait,
    {
        let mut select = select;
        if let Some(cursor) = &self.cursor {
            let value = cursor
                .value
                .ok_or_else(|| AppError::invalid("invalid cursor"))?;
            let condition = match self.direction {
                Direction::Forward => Condition::any()
                    .add(time.lt(value))
                    .add(time.eq(value).and(id.lt(cursor.id.as_str()))),
                Direction::Backward => Condition::any()
                    .add(time.gt(value))
                    .add(time.eq(value).and(id.gt(cursor.id.as_str()))),
            };
            select = select.filter(condition);
        }
        Ok(select
            .order_by(time, self.order())
            .order_by(id, self.order())
            .limit(self.size + 1))
    }

    /// Apply an id-only keyset to `select`, newest id first.
    pub fn apply_by_id<E, C>(&self, select: Select<E>, id: C) -> Select<E>
    where
        E: EntityTrait,
        C: ColumnTrait,
    {
        let mut select = select;
        if let Some(cursor) = &self.cursor {
            let condition = match self.direction {
                Direction::Forward => id.lt(cursor.id.as_str()),
                Direction::Backward => id.gt(cursor.id.as_str()),
            };
            select = select.filter(condition.into_condition());
        }
        select.order_by(id, self.order()).limit(self.size + 1)
    }

    /// Apply a lexicographic keyset to `select`; forward pages walk `A..Z`.
    pub fn apply_lexicographic<E, C>(&self, select: Select<E>, key: C) -> Select<E>
    where
        E: EntityTrait,
        C: ColumnTrait,
    {
        let mut select = select;
        if let Some(cursor) = &self.cursor {
            let condition = match self.direction {
                Direction::Forward => key.gt(cursor.id.as_str()),
                Direction::Backward => key.lt(cursor.id.as_str()),
            };
            select = select.filter(condition.into_condition());
        }
        let order = match self.direction {
            Direction::Forward => Order::Asc,
            Direction::Backward => Order::Desc,
        };
        select.order_by(key, order).limit(self.size + 1)
    }

    /// Trim the over-fetched row, restore display order and compute page info.
    pub fn finish<T>(&self, mut rows: Vec<T>, cursor_of: impl Fn(&T) -> Cursor) -> Page<T> {
        let size = self.size as usize;
        let has_more = rows.len() > size;
        rows.truncate(size);

        let (has_next_page, has_previous_page) = match self.direction {
            Direction::Forward => (has_more, self.cursor.is_some()),
            Direction::Backward => {
                rows.reverse();
                (self.cursor.is_some(), has_more)
            }
        };

        let page_info = PageInfo {
            has_next_page,
            has_previous_page,
            start_cursor: rows.first().map(|r| cursor_of(r).encode()),
            end_cursor: rows.last().map(|r| cursor_of(r).encode()),
        };
        Page {
            items: rows,
            page_info,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn config() -> PaginationConfig {
        PaginationConfig {
            default_page_size: 3,
            max_page_size: 200,
        }
    }

    #[test]
    fn defaults_to_forward_with_configured_size() {
        let req = PageRequest::parse(&PageArgs::default(), &config()).unwrap();
        assert_eq!(req.direction, Direction::Forward);
        assert_eq!(req.size, 3);
        assert!(req.cursor.is_none());
    }

    #[test]
    fn rejects_conflicting_arguments() {
        let args = PageArgs {
            first: Some(2),
            last: Some(2),
            ..Default::default()
        };
        assert!(matches!(
            PageRequest::parse(&args, &config()),
            Err(AppError::InvalidArgument { .. })
        ));

        let cursor = Cursor::from_id("x").encode();
        let args = PageArgs::first(2).before(cursor);
        assert!(PageRequest::parse(&args, &config()).is_err());
    }

    #[test]
    fn rejects_out_of_range_sizes() {
        assert!(PageRequest::parse(&PageArgs::first(0), &config()).is_err());
        assert!(PageRequest::parse(&PageArgs::first(201), &config()).is_err());
        assert!(PageRequest::parse(&PageArgs::last(200), &config()).is_ok());
    }

    #[test]
    fn rejects_garbage_cursor() {
        let args = PageArgs::first(2).after("not a cursor");
        assert!(matches!(
            PageRequest::parse(&args, &config()),
            Err(AppError::InvalidArgument { .. })
        ));
    }

    fn cursor(n: &u32) -> Cursor {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::seconds(*n as i64);
        Cursor::new(n.to_string(), at)
    }

    #[test]
    fn forward_page_trims_extra_row() {
        let req = PageRequest::forward(2);
        let page = req.finish(vec![9, 8, 7], cursor);
        assert_eq!(page.items, vec![9, 8]);
        assert!(page.page_info.has_next_page);
        assert!(!page.page_info.has_previous_page);
        assert_eq!(page.page_info.start_cursor, Some(cursor(&9).encode()));
        assert_eq!(page.page_info.end_cursor, Some(cursor(&8).encode()));
    }

    #[test]
    fn backward_page_is_reversed() {
        let req = PageRequest {
            direction: Direction::Backward,
            size: 2,
            cursor: Some(cursor(&5)),
        };
        // Rows arrive oldest first.
        let page = req.finish(vec![6, 7, 8], cursor);
        assert_eq!(page.items, vec![7, 6]);
        assert!(page.page_info.has_next_page);
        assert!(page.page_info.has_previous_page);
    }

    #[test]
    fn empty_page_has_no_cursors() {
        let page = PageRequest::forward(3).finish(Vec::<u32>::new(), cursor);
        assert!(page.items.is_empty());
        assert_eq!(page.page_info, PageInfo::default());
    }
}
