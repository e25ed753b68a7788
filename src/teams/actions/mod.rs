//! Engine operations, grouped by the record they act on.

mod invite;
mod join;
mod membership;
mod team;
