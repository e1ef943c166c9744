// Commerce
pub mod commerce;
