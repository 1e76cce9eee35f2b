pub mod provider_server;
