pub mod actor;
pub mod approval;
pub mod credit;
pub mod currency;
pub mod invoice;
pub mod order;
pub mod partner;
