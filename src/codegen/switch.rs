/// Switch dispatch selection (javac-style)
/// Chooses between tableswitch and lookupswitch by comparing their cost

use super::code::Code;
use super::label::Label;
use crate::common::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchKind {
    Table,
    Lookup,
}

/// javac's cost model: space plus three times the time cost
pub fn choose(keys: &[i32]) -> SwitchKind {
    let (Some(lo), Some(hi)) = (keys.iter().min(), keys.iter().max()) else {
        return SwitchKind::Lookup;
    };
    let n = keys.len() as i64;
    let table_space = 4 + (*hi as i64 - *lo as i64 + 1);
    let table_time = 3;
    let lookup_space = 3 + 2 * n;
    let lookup_time = n;
    if table_space + 3 * table_time <= lookup_space + 3 * lookup_time {
        SwitchKind::Table
    } else {
        SwitchKind::Lookup
    }
}

/// Emit the dispatch instruction for `cases` (key, target) with `default`
/// taking every other value. The selector is on the stack.
pub fn emit_dispatch(code: &mut Code, cases: &[(i32, Label)], default: Label) -> Result<SwitchKind> {
    let mut sorted = cases.to_vec();
    sorted.sort_by_key(|(key, _)| *key);
    let keys: Vec<i32> = sorted.iter().map(|(key, _)| *key).collect();
    let kind = choose(&keys);
    match kind {
        SwitchKind::Table => {
            let lo = keys[0];
            let hi = keys[keys.len() - 1];
            let mut targets = Vec::with_capacity((hi as i64 - lo as i64 + 1) as usize);
            let mut next = sorted.iter().peekable();
            for key in lo..=hi {
                match next.peek() {
                    Some((k, label)) if *k == key => {
                        targets.push(*label);
                        next.next();
                    }
                    _ => targets.push(default),
                }
            }
            code.emit_tableswitch(lo, hi, default, &targets)?;
        }
        SwitchKind::Lookup => code.emit_lookupswitch(default, &sorted)?,
    }
    Ok(kind)
}
