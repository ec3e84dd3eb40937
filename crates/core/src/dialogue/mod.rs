pub mod controller;
pub mod payload;
pub mod response;

pub use controller::Controller;
pub use payload::{
    encode_risks, is_structured, parse_risks, PayloadError, RISK_PAYLOAD_PREFIX,
};
pub use response::{SubstepRequest, TurnError, TurnResponse, RISK_TABLE_SUBSTEP};
