pub mod cursor;
pub mod id;
pub mod notification_kind;
pub mod participant_status;
pub mod publication_kind;
pub mod storage;
pub mod text;
pub mod validator;

pub use cursor::{Cursor, CursorError};
pub use notification_kind::{Coalesce, NotificationKind};
pub use participant_status::{ParticipantStatus, SendEffect};
pub use publication_kind::PublicationKind;
pub use validator::{FieldError, FieldErrors, Validator};
