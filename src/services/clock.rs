// src/services/clock.rs

use std::sync::Mutex;

use chrono::{DateTime, Duration, NaiveDate, Utc};

/// Fonte de tempo do motor. Produção usa `SystemClock`; os testes controlam
/// o dia com `FixedClock`.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug)]
pub struct FixedClock {
    agora: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(agora: DateTime<Utc>) -> Self {
        Self {
            agora: Mutex::new(agora),
        }
    }

    pub fn advance(&self, passo: Duration) {
        let mut agora = self.agora.lock().unwrap_or_else(|e| e.into_inner());
        *agora += passo;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.agora.lock().unwrap_or_else(|e| e.into_inner())
    }
}
