pub mod config;
pub mod embed;
pub mod model;
pub mod relay;
pub mod site;
pub mod web;
pub mod widget;
