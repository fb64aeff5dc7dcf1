//! Services layer - Business logic
//!
//! This module contains all business logic services for Research Locker.
//! Services are responsible for:
//! - Implementing business rules (plan limits, ownership, validation)
//! - Coordinating between repositories, the cache and upstream APIs
//! - Handling validation and error cases

pub mod article;
pub mod author;
pub mod billing;
pub mod collection;
pub mod crossref;
pub mod doi_reference;
pub mod email;
pub mod home_button;
pub mod password;
pub mod publisher;
pub mod rate_limiter;
pub mod summary;
pub mod tag;
pub mod token;
pub mod user;
pub mod validation;

pub use article::{ArticleService, ArticleServiceError};
pub use author::{AuthorService, AuthorSummary};
pub use billing::{BillingService, BillingServiceError, CreatedOrder};
pub use collection::{CollectionService, CollectionServiceError};
pub use crossref::{ArticleDraft, CrossrefClient, CrossrefError};
pub use doi_reference::{clean_doi, DoiReferenceService, DoiReferenceServiceError};
pub use email::{EmailService, Mailer};
pub use home_button::{HomeButtonService, HomeButtonServiceError};
pub use password::{hash_password, verify_password};
pub use publisher::{PublisherService, PublisherServiceError};
pub use rate_limiter::{RateLimitDecision, RequestRateLimiter};
pub use summary::{NormalizedSummary, SummaryFormat};
pub use tag::{TagService, TagServiceError};
pub use token::{Claims, TokenError, TokenService};
pub use user::{AuthSession, LoginInput, RegisterInput, UserService, UserServiceError};
pub use validation::FieldError;
