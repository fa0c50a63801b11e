mod helpers;
mod lifecycle;
mod traffic;
