use crate::{
    entities::{
        order, order_item, product, product_review, ModerationStatus, Order, OrderItem,
        OrderStatus, PaymentStatus, Product, ProductReview, ProductReviewModel,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, Iterable,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

/// Review submission and moderation.
///
/// New and edited reviews always enter the moderation queue as pending;
/// only approved, non-deleted reviews are publicly visible or counted in
/// rating aggregates.
#[derive(Clone)]
pub struct ReviewService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

/// Authenticated author identity, as reviews also accept anonymous
/// submissions.
#[derive(Debug, Clone)]
pub struct AuthorRef {
    pub user_id: Uuid,
    pub display_name: String,
}

/// Who is asking for the review list; widens what is visible.
#[derive(Debug, Clone, Copy)]
pub enum ReviewVisibility {
    /// Approved, non-deleted reviews only
    Public,
    /// Public set plus the user's own pending and rejected reviews
    ForUser(Uuid),
    /// Everything, including soft-deleted
    Staff,
}

impl ReviewService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self, input), fields(product_id = %product_id))]
    pub async fn create_review(
        &self,
        product_id: Uuid,
        author: Option<AuthorRef>,
        input: CreateReviewInput,
    ) -> Result<ProductReviewModel, ServiceError> {
        input.validate()?;

        let product = Product::find_by_id(product_id)
            .filter(product::Column::DeletedAt.is_null())
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {product_id} not found")))?;

        let author_name = match (&author, &input.author_name) {
            (Some(a), _) => a.display_name.clone(),
            (None, Some(name)) if !name.trim().is_empty() => name.trim().to_string(),
            (None, _) => {
                return Err(ServiceError::ValidationError(
                    "author_name is required for anonymous reviews".to_string(),
                ))
            }
        };

        let mut verified_purchase = false;
        if let Some(a) = &author {
            // Application-level duplicate check; the production schema
            // additionally carries a partial unique index on
            // (product_id, user_id) where deleted_at is null.
            let duplicate = ProductReview::find()
                .filter(product_review::Column::ProductId.eq(product.id))
                .filter(product_review::Column::UserId.eq(a.user_id))
                .filter(product_review::Column::DeletedAt.is_null())
                .one(&*self.db)
                .await?;
            if duplicate.is_some() {
                return Err(ServiceError::Conflict(
                    "you have already reviewed this product".to_string(),
                ));
            }
            verified_purchase = self.has_qualifying_purchase(a.user_id, product.id).await?;
        }

        let now = Utc::now();
        let model = product_review::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product.id),
            user_id: Set(author.as_ref().map(|a| a.user_id)),
            author_name: Set(author_name),
            rating: Set(input.rating),
            title: Set(input.title),
            body: Set(input.body),
            moderation_status: Set(ModerationStatus::Pending),
            moderation_note: Set(String::new()),
            moderated_by: Set(None),
            moderated_at: Set(None),
            verified_purchase: Set(verified_purchase),
            deleted_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let created = model.insert(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::ReviewSubmitted {
                review_id: created.id,
                product_id: product.id,
            })
            .await;
        info!(review_id = %created.id, verified = verified_purchase, "review submitted");
        Ok(created)
    }

    /// A purchase qualifies when a non-deleted order of the author is
    /// paid for and at least shipped-or-paid, and contains the product.
    async fn has_qualifying_purchase(
        &self,
        user_id: Uuid,
        product_id: Uuid,
    ) -> Result<bool, ServiceError> {
        let count = OrderItem::find()
            .inner_join(Order)
            .filter(order_item::Column::ProductId.eq(product_id))
            .filter(order::Column::UserId.eq(user_id))
            .filter(order::Column::PaymentStatus.eq(PaymentStatus::Paid))
            .filter(order::Column::DeletedAt.is_null())
            .filter(
                order::Column::Status
                    .is_in(OrderStatus::iter().filter(|s| s.qualifies_for_verified_purchase())),
            )
            .count(&*self.db)
            .await?;
        Ok(count > 0)
    }

    pub async fn list_for_product(
        &self,
        product_id: Uuid,
        visibility: ReviewVisibility,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<ProductReviewModel>, u64), ServiceError> {
        let mut query = ProductReview::find()
            .filter(product_review::Column::ProductId.eq(product_id))
            .order_by_desc(product_review::Column::CreatedAt);

        match visibility {
            ReviewVisibility::Public => {
                query = query
                    .filter(product_review::Column::ModerationStatus.eq(ModerationStatus::Approved))
                    .filter(product_review::Column::DeletedAt.is_null());
            }
            ReviewVisibility::ForUser(user_id) => {
                query = query.filter(product_review::Column::DeletedAt.is_null()).filter(
                    Condition::any()
                        .add(
                            product_review::Column::ModerationStatus
                                .eq(ModerationStatus::Approved),
                        )
                        .add(product_review::Column::UserId.eq(user_id)),
                );
            }
            ReviewVisibility::Staff => {}
        }

        let paginator = query.paginate(&*self.db, per_page.max(1));
        let total = paginator.num_items().await?;
        let data = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((data, total))
    }

    /// Staff moderation queue: pending, non-deleted, oldest first.
    pub async fn list_pending(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<ProductReviewModel>, u64), ServiceError> {
        let paginator = ProductReview::find()
            .filter(product_review::Column::ModerationStatus.eq(ModerationStatus::Pending))
            .filter(product_review::Column::DeletedAt.is_null())
            .order_by_asc(product_review::Column::CreatedAt)
            .paginate(&*self.db, per_page.max(1));
        let total = paginator.num_items().await?;
        let data = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((data, total))
    }

    async fn find_active(&self, review_id: Uuid) -> Result<ProductReviewModel, ServiceError> {
        ProductReview::find_by_id(review_id)
            .filter(product_review::Column::DeletedAt.is_null())
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Review {review_id} not found")))
    }

    /// Author edit. Any content change sends the review back to the
    /// moderation queue; `verified_purchase` stays as computed at
    /// creation.
    #[instrument(skip(self, input))]
    pub async fn update_review(
        &self,
        review_id: Uuid,
        author_id: Uuid,
        input: UpdateReviewInput,
    ) -> Result<ProductReviewModel, ServiceError> {
        input.validate()?;
        let existing = self.find_active(review_id).await?;

        if existing.user_id != Some(author_id) {
            return Err(ServiceError::Forbidden(
                "only the author may edit a review".to_string(),
            ));
        }

        let product_id = existing.product_id;
        let mut active: product_review::ActiveModel = existing.into();
        if let Some(rating) = input.rating {
            active.rating = Set(rating);
        }
        if let Some(title) = input.title {
            active.title = Set(title);
        }
        if let Some(body) = input.body {
            active.body = Set(body);
        }
        active.moderation_status = Set(ModerationStatus::Pending);
        active.moderation_note = Set(String::new());
        active.moderated_by = Set(None);
        active.moderated_at = Set(None);
        active.updated_at = Set(Utc::now());

        let updated = active.update(&*self.db).await?;
        self.event_sender
            .send_or_log(Event::ReviewSubmitted {
                review_id: updated.id,
                product_id,
            })
            .await;
        Ok(updated)
    }

    /// Staff decision. Repeatable: a review may be re-moderated after
    /// edits or a change of mind.
    #[instrument(skip(self, input))]
    pub async fn moderate(
        &self,
        review_id: Uuid,
        moderator_id: Uuid,
        input: ModerateReviewInput,
    ) -> Result<ProductReviewModel, ServiceError> {
        let existing = self.find_active(review_id).await?;

        let status = match input.decision {
            ModerationDecision::Approve => ModerationStatus::Approved,
            ModerationDecision::Reject => ModerationStatus::Rejected,
        };

        let mut active: product_review::ActiveModel = existing.into();
        active.moderation_status = Set(status);
        active.moderation_note = Set(input.note.unwrap_or_default());
        active.moderated_by = Set(Some(moderator_id));
        active.moderated_at = Set(Some(Utc::now()));
        active.updated_at = Set(Utc::now());

        let updated = active.update(&*self.db).await?;
        self.event_sender
            .send_or_log(Event::ReviewModerated {
                review_id: updated.id,
                approved: status == ModerationStatus::Approved,
            })
            .await;
        info!(review_id = %review_id, ?status, "review moderated");
        Ok(updated)
    }

    /// Author or staff removal. Frees the author's one-active-review slot
    /// for the product.
    #[instrument(skip(self))]
    pub async fn soft_delete(
        &self,
        review_id: Uuid,
        caller_id: Uuid,
        caller_is_staff: bool,
    ) -> Result<(), ServiceError> {
        let existing = self.find_active(review_id).await?;

        if !caller_is_staff && existing.user_id != Some(caller_id) {
            return Err(ServiceError::Forbidden(
                "only the author or staff may delete a review".to_string(),
            ));
        }

        let mut active: product_review::ActiveModel = existing.into();
        active.deleted_at = Set(Some(Utc::now()));
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;
        Ok(())
    }
}

/// Payload for submitting a review
#[derive(Debug, Deserialize, Validate)]
pub struct CreateReviewInput {
    #[validate(range(min = 1, max = 5))]
    pub rating: i32,
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(min = 1, max = 10000))]
    pub body: String,
    /// Display name; required when submitting anonymously
    pub author_name: Option<String>,
}

/// Payload for editing a review
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateReviewInput {
    #[validate(range(min = 1, max = 5))]
    pub rating: Option<i32>,
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 10000))]
    pub body: Option<String>,
}

/// Staff moderation decision
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationDecision {
    Approve,
    Reject,
}

/// Payload for the moderation endpoint
#[derive(Debug, Deserialize)]
pub struct ModerateReviewInput {
    pub decision: ModerationDecision,
    pub note: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_input_rejects_out_of_range_rating() {
        let input = CreateReviewInput {
            rating: 6,
            title: "Great".to_string(),
            body: "Really great".to_string(),
            author_name: None,
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn create_input_accepts_valid_rating() {
        let input = CreateReviewInput {
            rating: 4,
            title: "Solid".to_string(),
            body: "Does the job".to_string(),
            author_name: Some("Anna".to_string()),
        };
        assert!(input.validate().is_ok());
    }

    #[test]
    fn moderation_decision_deserializes_snake_case() {
        let d: ModerationDecision = serde_json::from_str("\"approve\"").unwrap();
        assert!(matches!(d, ModerationDecision::Approve));
        let d: ModerationDecision = serde_json::from_str("\"reject\"").unwrap();
        assert!(matches!(d, ModerationDecision::Reject));
    }
}
