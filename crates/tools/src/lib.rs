pub mod gomocup;
pub mod output;
