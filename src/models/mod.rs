pub mod click;
pub mod money;
pub mod settings;
pub mod url;
pub mod user;
pub mod withdrawal;

pub use click::{ClickEvent, ClickMetadata, ClickOutcome};
pub use money::{amount_to_micros, micros_to_amount, UNIQUE_VIEW_EARNINGS_MICROS};
pub use settings::{SettingsPatch, SettingsRow, UserSettings};
pub use url::{CreateUrlRequest, LinkUpdate, ShortLink, UpdateUrlRequest};
pub use user::{
    MissingFields, PaymentMethod, ProfileUpdate, UpdateProfileRequest, User, UserProfile,
};
pub use withdrawal::{CreateWithdrawalRequest, Withdrawal, WithdrawalStatus};
