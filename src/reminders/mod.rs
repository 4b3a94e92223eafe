// Daily payment reminders

pub mod clock;
pub mod digest;
pub mod scheduler;

pub use clock::{Clock, SystemClock};
pub use scheduler::{ReminderScheduleConfig, ReminderScheduler};
