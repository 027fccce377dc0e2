// src/middleware.rs

pub mod usuario;
