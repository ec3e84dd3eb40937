pub mod conversation;
pub mod quotation;
pub mod risk;
