mod server_tests;
mod tcp_tests;
