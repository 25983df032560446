pub mod link_flow;
