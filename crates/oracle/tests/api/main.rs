mod health;
mod helpers;
mod predict;
