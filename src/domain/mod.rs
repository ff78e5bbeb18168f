pub mod command;
pub mod comparison;
pub mod intent;
pub mod price;
pub mod record;
pub mod site;
pub mod workflow;
