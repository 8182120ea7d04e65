mod accounts;
mod admin;
mod deposits;
mod helpers;
mod mocks;
