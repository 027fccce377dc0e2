pub mod garantia;
pub mod ordem_servico;
pub mod comercial;
pub mod timeline;
