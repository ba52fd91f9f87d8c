pub mod balance;
pub mod calendar;
pub mod demand;
pub mod dispatch;
pub mod economics;
pub mod generation;
pub mod mobility;
pub mod scoring;
pub mod series;
