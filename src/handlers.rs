// src/handlers.rs

pub mod adesoes;
pub mod garantias;
pub mod ordens_servico;
