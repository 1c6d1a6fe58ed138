pub mod image;
pub mod mailer;
pub mod reset;

pub use image::{ImageError, ProfileImageService};
pub use mailer::{MailError, Mailer};
pub use reset::ResetTokens;
