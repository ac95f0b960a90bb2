pub mod click;
pub mod link;

pub use click::{ClickEvent, ClickProperties};
pub use link::{
    CreateLinkForm, CreateLinkResponse, LinkRecord, LinkResponseProperties, ShortLinkProperties,
};
