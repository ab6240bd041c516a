//! Background loops driven off the event-loop clock.

pub mod poll_loop;
pub mod render_loop;
