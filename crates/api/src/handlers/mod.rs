pub mod operator;
pub mod webhook;
