pub mod cod;
pub mod delivery;
pub mod orders;
pub mod returns;
