//! F001: tainted data reaching a query API.

use super::{sink_scan, ALL_LANGUAGES};
use crate::error::Result;
use crate::eval::EvalSession;
use crate::rules::{Dispatcher, FindingId, Match};

pub(super) fn register(dispatcher: &mut Dispatcher) {
    dispatcher.register(FindingId::F001, ALL_LANGUAGES, scan);
}

fn scan(session: &mut EvalSession<'_>) -> Result<Vec<Match>> {
    sink_scan(session, "SQL injection")
}
