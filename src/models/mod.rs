//! Data models
//!
//! This module contains the data structures used throughout Research Locker:
//! - Database entities (User, Article, Tag, Collection, Publisher, DoiReference,
//!   HomeButton, Plan, Payment, UserPlan, PasswordReset)
//! - API request types
//! - Pagination helpers

mod article;
mod billing;
mod collection;
mod doi_reference;
mod home_button;
mod password_reset;
mod publisher;
mod tag;
mod user;

pub use article::{Article, ArticleInput, LibraryInfo, ListParams, PagedResult};
pub use billing::{Payment, PaymentStatus, Plan, UserPlan};
pub use collection::{AssignOutcome, Collection, CollectionNameInput, CollectionWithArticles};
pub use doi_reference::{DoiReference, DoiReferenceView, SaveReferencesOutcome};
pub use home_button::{HomeButton, HomeButtonInput, BUTTON_POSITIONS};
pub use password_reset::PasswordReset;
pub use publisher::{Publisher, PublisherWithArticles};
pub use tag::{parse_hashtags, Tag};
pub use user::{CreateUserInput, UpdateProfileInput, User, UserPlanKind, GENDERS};
