pub mod chatbot;
pub mod storage_gateway;
