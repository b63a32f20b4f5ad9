use chrono::Duration;
use rand::Rng;
use rand::distr::Alphanumeric;
use sea_orm::*;

use super::RelStore;
use super::users::{find_user_by_email, insert_user, set_email};
use crate::entity::{email_verification_code, user};
use crate::error::AppError;
use crate::utils::now;

const CODE_LEN: usize = 32;

fn new_code() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(CODE_LEN)
        .map(char::from)
        .collect()
}

impl RelStore {
    /// Create a single-use verification code for `email`. `user_id` binds the
    /// code to an email change of that user.
    pub async fn create_code(&self, email: &str, user_id: Option<&str>) -> Result<String, AppError> {
        let model = email_verification_code::ActiveModel {
            code: Set(new_code()),
            email: Set(email.to_string()),
            user_id: Set(user_id.map(str::to_string)),
            created_at: Set(now()),
        }
        .insert(&self.db)
        .await?;
        Ok(model.code)
    }

    pub async fn delete_code(&self, email: &str, code: &str) -> Result<(), AppError> {
        email_verification_code::Entity::delete_many()
            .filter(email_verification_code::Column::Email.eq(email))
            .filter(email_verification_code::Column::Code.eq(code))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    /// Consume a verification code and resolve the user it authenticates.
    ///
    /// A code bound to a user changes that user's email. Otherwise the user
    /// owning the email is returned, or created when `username` is given.
    /// The code row is deleted in the same transaction.
    pub async fn use_code(
        &self,
        email: &str,
        code: &str,
        ttl: Duration,
        username: Option<&str>,
    ) -> Result<user::Model, AppError> {
        let txn = self.db.begin().await?;
        let row = email_verification_code::Entity::find_by_id(code)
            .filter(email_verification_code::Column::Email.eq(email))
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::not_found("verification code not found"))?;

        if now() - row.created_at > ttl {
            email_verification_code::Entity::delete_by_id(code).exec(&txn).await?;
            txn.commit().await?;
            return Err(AppError::not_found("verification code expired"));
        }

        let user = match row.user_id.as_deref() {
            Some(user_id) => set_email(&txn, user_id, email).await?,
            None => match find_user_by_email(&txn, email).await? {
                Some(user) => user,
                None => match username {
                    Some(username) => insert_user(&txn, email, username).await?,
                    None => return Err(AppError::not_found("user not found")),
                },
            },
        };

        email_verification_code::Entity::delete_by_id(code).exec(&txn).await?;
        txn.commit().await?;
        Ok(user)
    }
}
