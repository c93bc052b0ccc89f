pub mod alarms;
pub mod status;
