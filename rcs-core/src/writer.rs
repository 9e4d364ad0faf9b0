//! Archive writer (C11): serializes the in-memory admin + delta graph back
//! into `,v` grammar, preserving unchanged deltatext bodies verbatim from
//! the source archive where possible (§4.11).
use std::collections::{HashMap, HashSet};

use comma_v::{Admin, File, Num};

use crate::{num, source::escape};

/// Per-delta content the caller wants to replace; `None` fields fall back
/// to copying the original span verbatim from the source archive (§4.11
/// "permitted to copy the original span verbatim").
#[derive(Debug, Default, Clone)]
pub struct Override {
    pub log: Option<Vec<u8>>,
    pub text: Option<Vec<u8>>,
}

/// Serializes `file` into `,v` grammar. `archive` is the source buffer
/// spans are relative to; `overrides` supplies fresh bodies for deltas
/// that changed (new deposits, or an outgoing head whose body became a
/// reverse-diff script).
pub fn write(file: &File, archive: &[u8], overrides: &HashMap<Num, Override>) -> Vec<u8> {
    let mut out = Vec::new();
    write_admin(&mut out, &file.admin, archive);
    out.push(b'\n');

    let order = traversal_order(file);
    for num in &order {
        if let Some(delta) = file.delta.get(num) {
            write_delta_header(&mut out, num, delta, archive);
        }
    }

    out.extend_from_slice(b"\n");
    write_string_clause(&mut out, "desc", archive, file.desc);

    // Deltatext bodies are emitted in source order for existing deltas
    // (preserving byte positions where the body is unchanged), then any
    // delta new to this write that wasn't present in the source order.
    let mut emitted: HashSet<Num> = HashSet::new();
    for num in &file.delta_text_order {
        write_deltatext(&mut out, num, file, archive, overrides);
        emitted.insert(num.clone());
    }
    for num in &order {
        if !emitted.contains(num) && file.delta.contains_key(num) {
            write_deltatext(&mut out, num, file, archive, overrides);
            emitted.insert(num.clone());
        }
    }

    out
}

fn write_admin(out: &mut Vec<u8>, admin: &Admin, archive: &[u8]) {
    write_field(out, "head", admin.head.as_ref().map(|n| n.as_slice()));
    out.push(b'\n');
    if let Some(branch) = &admin.branch {
        out.extend_from_slice(b"branch\t");
        out.extend_from_slice(branch);
        out.extend_from_slice(b";\n");
    }
    out.extend_from_slice(b"access");
    for id in &admin.access {
        out.extend_from_slice(b"\n\t");
        out.extend_from_slice(id);
    }
    out.extend_from_slice(b";\n");

    out.extend_from_slice(b"symbols");
    for (sym, num) in &admin.symbols {
        out.extend_from_slice(b"\n\t");
        out.extend_from_slice(sym);
        out.push(b':');
        out.extend_from_slice(num);
    }
    out.extend_from_slice(b";\n");

    out.extend_from_slice(b"locks");
    for (id, num) in &admin.locks {
        out.extend_from_slice(b"\n\t");
        out.extend_from_slice(id);
        out.push(b':');
        out.extend_from_slice(num);
    }
    if admin.strict {
        out.extend_from_slice(b"; strict");
    }
    out.extend_from_slice(b";\n");

    if let Some(span) = admin.comment {
        write_string_clause(out, "comment", archive, span);
    }
    if let Some(span) = admin.expand {
        write_string_clause(out, "expand", archive, span);
    }
}

fn write_field(out: &mut Vec<u8>, name: &str, value: Option<&[u8]>) {
    out.extend_from_slice(name.as_bytes());
    if let Some(v) = value {
        out.push(b'\t');
        out.extend_from_slice(v);
    }
    out.push(b';');
}

fn write_string_clause(out: &mut Vec<u8>, name: &str, archive: &[u8], span: comma_v::Span) {
    let raw = crate::source::materialize_escaped(&archive[span.offset..span.offset + span.len]);
    out.extend_from_slice(name.as_bytes());
    out.push(b'\n');
    out.push(b'@');
    out.extend_from_slice(&escape(&raw));
    out.extend_from_slice(b"@\n\n");
}

fn write_delta_header(out: &mut Vec<u8>, num: &Num, delta: &comma_v::Delta, archive: &[u8]) {
    out.extend_from_slice(num);
    out.extend_from_slice(b"\n");

    let date = crate::source::materialize_escaped(
        &archive[delta.date.offset..delta.date.offset + delta.date.len],
    );
    out.extend_from_slice(b"date\t");
    out.extend_from_slice(&date);
    out.extend_from_slice(b";\tauthor ");
    out.extend_from_slice(&delta.author);
    out.extend_from_slice(b";\tstate");
    if let Some(state) = &delta.state {
        out.push(b' ');
        out.extend_from_slice(state);
    }
    out.extend_from_slice(b";\nbranches");
    for b in &delta.branches {
        out.extend_from_slice(b"\n\t");
        out.extend_from_slice(b);
    }
    out.extend_from_slice(b";\nnext\t");
    if let Some(next) = &delta.next {
        out.extend_from_slice(next);
    }
    out.extend_from_slice(b";\n");
    if let Some(commit_id) = &delta.commit_id {
        out.extend_from_slice(b"commitid\t");
        out.extend_from_slice(commit_id);
        out.extend_from_slice(b";\n");
    }
    out.push(b'\n');
}

fn traversal_order(file: &File) -> Vec<Num> {
    let mut order = Vec::new();
    let mut visited = HashSet::new();
    if let Some(head) = &file.admin.head {
        visit_chain(file, head, &mut order, &mut visited);
    }
    order
}

/// Walks one spine (the trunk, or a single branch's own line of
/// development) to exhaustion, then recurses pre-order into every branch
/// rooted on a node of that spine, sorted by branch number (§4.11).
fn visit_chain(file: &File, start: &Num, order: &mut Vec<Num>, visited: &mut HashSet<Num>) {
    let mut spine = Vec::new();
    let mut cur = Some(start.clone());
    while let Some(n) = cur {
        if !visited.insert(n.clone()) {
            break;
        }
        spine.push(n.clone());
        cur = file.delta.get(&n).and_then(|d| d.next.clone());
    }
    order.extend(spine.iter().cloned());

    for n in &spine {
        if let Some(delta) = file.delta.get(n) {
            let mut branches = delta.branches.clone();
            branches.sort_by(|a, b| num::cmp_num(a, b));
            for b in branches {
                visit_chain(file, &b, order, visited);
            }
        }
    }
}

fn write_deltatext(
    out: &mut Vec<u8>,
    num: &Num,
    file: &File,
    archive: &[u8],
    overrides: &HashMap<Num, Override>,
) {
    let dt = file.delta_text.get(num);
    let ov = overrides.get(num);

    // A delta new to this write has no source `DeltaText` -- it must come
    // entirely from an override, log and text both.
    if dt.is_none() && ov.map_or(true, |o| o.log.is_none() || o.text.is_none()) {
        return;
    }

    out.extend_from_slice(num);
    out.extend_from_slice(b"\n");

    let log = match ov.and_then(|o| o.log.as_ref()) {
        Some(fresh) => escape(fresh),
        None => escape(&crate::source::materialize_escaped(
            &archive[dt.unwrap().log.offset..dt.unwrap().log.offset + dt.unwrap().log.len],
        )),
    };
    out.extend_from_slice(b"log\n@");
    out.extend_from_slice(&log);
    out.extend_from_slice(b"@\n");

    let text = match ov.and_then(|o| o.text.as_ref()) {
        Some(fresh) => escape(fresh),
        None => {
            // Unchanged body: copy the original escaped span verbatim
            // rather than round-tripping through unescape/re-escape.
            let dt = dt.unwrap();
            archive[dt.text.offset..dt.text.offset + dt.text.len].to_vec()
        }
    };
    out.extend_from_slice(b"text\n@");
    out.extend_from_slice(&text);
    out.extend_from_slice(b"@\n\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &[u8] = b"head\t1.1;\naccess;\nsymbols;\nlocks; strict;\n\n1.1\ndate\t2024.01.02.03.04.05;\tauthor ada;\tstate Exp;\nbranches;\nnext\t;\n\ndesc\n@project desc@\n\n1.1\nlog\n@init\n@\ntext\n@line 1\nline 2\n@\n";

    #[test]
    fn test_round_trip_unchanged_body() {
        let file = comma_v::parse(MINIMAL).unwrap();
        let out = write(&file, MINIMAL, &HashMap::new());
        let reparsed = comma_v::parse(&out).unwrap();

        assert_eq!(reparsed.admin.head, file.admin.head);
        assert_eq!(reparsed.delta.len(), 1);
        let (_, dt) = reparsed.revision(&Num(b"1.1".to_vec())).unwrap();
        let text = &out[dt.text.offset..dt.text.offset + dt.text.len];
        assert_eq!(text, b"line 1\nline 2\n");
    }

    #[test]
    fn test_override_replaces_text() {
        let file = comma_v::parse(MINIMAL).unwrap();
        let mut overrides = HashMap::new();
        overrides.insert(
            Num(b"1.1".to_vec()),
            Override {
                log: None,
                text: Some(b"new text\n".to_vec()),
            },
        );
        let out = write(&file, MINIMAL, &overrides);
        let reparsed = comma_v::parse(&out).unwrap();
        let (_, dt) = reparsed.revision(&Num(b"1.1".to_vec())).unwrap();
        let text = &out[dt.text.offset..dt.text.offset + dt.text.len];
        assert_eq!(text, b"new text\n");
    }

    #[test]
    fn test_admin_lists_round_trip_with_multiple_entries() {
        const SOURCE: &[u8] = b"head\t1.1;\naccess\n\talice\n\tbob;\nsymbols\n\tv1:1.1;\nlocks\n\tada:1.1;\n\n1.1\ndate\t2024.01.02.03.04.05;\tauthor ada;\tstate Exp;\nbranches;\nnext\t;\n\ndesc\n@@\n\n1.1\nlog\n@init\n@\ntext\n@line 1\n@\n";
        let file = comma_v::parse(SOURCE).unwrap();
        let out = write(&file, SOURCE, &HashMap::new());
        let reparsed = comma_v::parse(&out).unwrap();

        assert_eq!(reparsed.admin.access, file.admin.access);
        assert_eq!(reparsed.admin.symbols, file.admin.symbols);
        assert_eq!(reparsed.admin.locks, file.admin.locks);
        assert!(!reparsed.admin.strict);
    }

    #[test]
    fn test_non_strict_locks_clause_has_no_trailing_space() {
        const SOURCE: &[u8] = b"head\t1.1;\naccess;\nsymbols;\nlocks;\n\n1.1\ndate\t2024.01.02.03.04.05;\tauthor ada;\tstate Exp;\nbranches;\nnext\t;\n\ndesc\n@@\n\n1.1\nlog\n@init\n@\ntext\n@line 1\n@\n";
        let file = comma_v::parse(SOURCE).unwrap();
        let out = write(&file, SOURCE, &HashMap::new());
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("locks;\n"));
        assert!(!text.contains("locks; \n"));
    }

    #[test]
    fn test_delta_header_branches_round_trip_with_multiple_entries() {
        let order = traversal_order_fixture_with_two_branches();
        assert_eq!(order.0.len(), 3);
        let out = write(&order.1, b"", &HashMap::new());
        let reparsed = comma_v::parse(&out).unwrap();
        let mut branches = reparsed.delta.get(&Num(b"1.2".to_vec())).unwrap().branches.clone();
        branches.sort_by(|a, b| num::cmp_num(a, b));
        assert_eq!(
            branches,
            vec![Num(b"1.2.2.1".to_vec()), Num(b"1.2.4.1".to_vec())]
        );
    }

    fn traversal_order_fixture_with_two_branches() -> (Vec<Num>, File) {
        let mut delta_map = std::collections::HashMap::new();
        delta_map.insert(
            Num(b"1.2".to_vec()),
            comma_v::Delta {
                date: comma_v::Span::new(0, 0),
                author: comma_v::Id(b"ada".to_vec()),
                state: Some(comma_v::Id(b"Exp".to_vec())),
                branches: vec![Num(b"1.2.2.1".to_vec()), Num(b"1.2.4.1".to_vec())],
                next: None,
                commit_id: None,
            },
        );
        delta_map.insert(
            Num(b"1.2.2.1".to_vec()),
            comma_v::Delta {
                date: comma_v::Span::new(0, 0),
                author: comma_v::Id(b"ada".to_vec()),
                state: Some(comma_v::Id(b"Exp".to_vec())),
                branches: vec![],
                next: None,
                commit_id: None,
            },
        );
        delta_map.insert(
            Num(b"1.2.4.1".to_vec()),
            comma_v::Delta {
                date: comma_v::Span::new(0, 0),
                author: comma_v::Id(b"ada".to_vec()),
                state: Some(comma_v::Id(b"Exp".to_vec())),
                branches: vec![],
                next: None,
                commit_id: None,
            },
        );
        let file = File {
            admin: comma_v::Admin {
                head: Some(Num(b"1.2".to_vec())),
                branch: None,
                access: vec![],
                symbols: vec![],
                locks: vec![],
                strict: false,
                comment: None,
                expand: None,
            },
            delta: delta_map,
            neck: 0,
            desc: comma_v::Span::new(0, 0),
            delta_text: std::collections::HashMap::new(),
            delta_text_order: vec![],
        };
        let order = traversal_order(&file);
        (order, file)
    }

    #[test]
    fn test_traversal_order_trunk_then_branch() {
        let mut delta_map = std::collections::HashMap::new();
        delta_map.insert(
            Num(b"1.2".to_vec()),
            comma_v::Delta {
                date: comma_v::Span::new(0, 0),
                author: comma_v::Id(b"ada".to_vec()),
                state: None,
                branches: vec![Num(b"1.1.1.1".to_vec())],
                next: Some(Num(b"1.1".to_vec())),
                commit_id: None,
            },
        );
        delta_map.insert(
            Num(b"1.1".to_vec()),
            comma_v::Delta {
                date: comma_v::Span::new(0, 0),
                author: comma_v::Id(b"ada".to_vec()),
                state: None,
                branches: vec![],
                next: None,
                commit_id: None,
            },
        );
        delta_map.insert(
            Num(b"1.1.1.1".to_vec()),
            comma_v::Delta {
                date: comma_v::Span::new(0, 0),
                author: comma_v::Id(b"bob".to_vec()),
                state: None,
                branches: vec![],
                next: None,
                commit_id: None,
            },
        );
        let file = File {
            admin: comma_v::Admin {
                head: Some(Num(b"1.2".to_vec())),
                branch: None,
                access: vec![],
                symbols: vec![],
                locks: vec![],
                strict: false,
                comment: None,
                expand: None,
            },
            delta: delta_map,
            neck: 0,
            desc: comma_v::Span::new(0, 0),
            delta_text: std::collections::HashMap::new(),
            delta_text_order: vec![],
        };

        let order = traversal_order(&file);
        assert_eq!(
            order,
            vec![
                Num(b"1.2".to_vec()),
                Num(b"1.1".to_vec()),
                Num(b"1.1.1.1".to_vec())
            ]
        );
    }
}
