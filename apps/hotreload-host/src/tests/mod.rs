mod logger;
mod mirror;
