use bcgraph::bytecode::opcodes::*;
use bcgraph::bytecode::{Method, MethodAccessFlags};
use bcgraph::graph::GraphBuilder;
use bcgraph::ir::{BlockEnd, BlockFlags, BlockId, ExceptionHandler, IrGraph};
use bcgraph::{Error, Options};
use std::collections::HashMap;

fn static_method(code: Vec<u8>) -> Method {
    Method::new("test", MethodAccessFlags::STATIC, code)
}

fn build<'a>(
    method: &'a Method,
    constant_pool: &'a HashMap<u16, String>,
    options: &'a Options,
) -> Result<IrGraph<'a>, Error> {
    GraphBuilder::new(method, constant_pool, options).build()
}

/// Start of every parsed block, in parse order
fn parse_order(graph: &IrGraph) -> Vec<usize> {
    graph
        .block_order
        .iter()
        .map(|block| graph.block(*block).bci)
        .collect()
}

fn parsed_at(graph: &IrGraph, bci: usize) -> Vec<BlockId> {
    graph
        .block_order
        .iter()
        .copied()
        .filter(|block| graph.block(*block).bci == bci)
        .collect()
}

/// `for (int i = 0; i < 10; i++) {}`
fn counted_loop() -> Vec<u8> {
    vec![
        ICONST_0, // 0
        0x3c,     // 1: istore_1
        0x1b,     // 2: iload_1
        BIPUSH, 10, // 3
        IF_ICMPGE, 0x00, 0x09, // 5: -> 14
        IINC, 1, 1, // 8
        GOTO, 0xff, 0xf7, // 11: -> 2
        RETURN, // 14
    ]
}

#[test]
fn straight_line() {
    let method = static_method(vec![ICONST_1, BIPUSH, 2, IADD, IRETURN]);
    let (constant_pool, options) = (HashMap::new(), Options::default());
    let graph = build(&method, &constant_pool, &options).unwrap();

    assert_eq!(parse_order(&graph), vec![0]);
    let start = graph.start.unwrap();
    assert_eq!(graph.block_order, vec![start]);
    let block = graph.block(start);
    assert_eq!(block.end, Some(BlockEnd::Return));
    let opcodes: Vec<u8> = block
        .instructions
        .iter()
        .map(|insn| graph.instruction(*insn).opcode)
        .collect();
    assert_eq!(opcodes, vec![ICONST_1, BIPUSH, IADD, IRETURN]);
}

#[test]
fn loop_parsed_in_depth_first_order() {
    let method = static_method(counted_loop());
    let (constant_pool, options) = (HashMap::new(), Options::default());
    let graph = build(&method, &constant_pool, &options).unwrap();

    assert_eq!(parse_order(&graph), vec![0, 2, 8, 14]);
    let [entry, header, body, exit] = [0, 2, 8, 14].map(|bci| parsed_at(&graph, bci)[0]);
    assert_eq!(graph.block(entry).end, Some(BlockEnd::Goto(header)));
    assert_eq!(
        graph.block(header).end,
        Some(BlockEnd::If {
            taken: exit,
            not_taken: body
        })
    );
    assert_eq!(graph.block(body).end, Some(BlockEnd::Goto(header)));
    assert!(graph
        .block(header)
        .check_block_flag(BlockFlags::PARSER_LOOP_HEADER));
    assert_eq!(graph.block(header).predecessors, vec![entry, body]);
}

#[test]
fn too_many_blocks() {
    let method = static_method(counted_loop());
    let constant_pool = HashMap::new();
    let options = Options {
        maximum_block_count: 2,
        ..Options::default()
    };
    let err = build(&method, &constant_pool, &options).unwrap_err();
    assert!(err.is_bailout(), "{:?}", err);
}

#[test]
fn exception_edges_for_protected_blocks() {
    let mut method = static_method(vec![
        ICONST_1, // 0
        0x3c,     // 1: istore_1
        RETURN,   // 2
        0x4d,     // 3: astore_2
        RETURN,   // 4
    ]);
    method
        .exception_table
        .push(ExceptionHandler::new(0, 3, 3, 1));
    let mut constant_pool = HashMap::new();
    constant_pool.insert(1, String::from("java/lang/Exception"));
    let options = Options::default();
    let graph = build(&method, &constant_pool, &options).unwrap();

    assert_eq!(parse_order(&graph), vec![0, 3]);
    let (protected, handler) = (graph.block_order[0], graph.block_order[1]);
    assert_eq!(graph.block(protected).exception_handlers, vec![handler]);
    assert!(graph.block(handler).exception_handlers.is_empty());
    assert!(graph
        .block(handler)
        .check_block_flag(BlockFlags::EXCEPTION_ENTRY));

    let scope_handlers = graph.scopes[0].exception_handlers().unwrap();
    assert_eq!(scope_handlers.len(), 1);
    assert_eq!(scope_handlers[0].entry_block, Some(handler));
}

#[test]
fn subroutine_inlined_at_each_call_site() {
    let method = static_method(vec![
        JSR, 0x00, 0x08, // 0: -> 8
        JSR, 0x00, 0x05, // 3: -> 8
        ICONST_0, // 6
        RETURN,   // 7
        0x4c,     // 8: astore_1
        NOP,      // 9
        RET, 1,   // 10
    ]);
    let (constant_pool, options) = (HashMap::new(), Options::default());
    let graph = build(&method, &constant_pool, &options).unwrap();

    assert_eq!(parse_order(&graph), vec![0, 8, 3, 8, 6]);
    let copies = parsed_at(&graph, 8);
    assert_eq!(copies.len(), 2);
    assert_ne!(copies[0], copies[1]);
    let [first, second] = [copies[0], copies[1]].map(|block| graph.block(block));
    assert_eq!(first.depth_first_number, second.depth_first_number);
    assert!(first.check_block_flag(BlockFlags::SUBROUTINE_ENTRY));
    assert!(second.check_block_flag(BlockFlags::SUBROUTINE_ENTRY));

    // Each copy returns to its own call site
    let [call1, call2, exit] = [0, 3, 6].map(|bci| parsed_at(&graph, bci)[0]);
    assert_eq!(
        graph.block(call1).end,
        Some(BlockEnd::Jsr {
            entry: copies[0],
            continuation: call2
        })
    );
    assert_eq!(first.end, Some(BlockEnd::Ret(call2)));
    assert_eq!(second.end, Some(BlockEnd::Ret(exit)));
    assert_eq!(graph.block(exit).end, Some(BlockEnd::Return));
}

#[test]
fn subroutine_that_never_returns() {
    let method = static_method(vec![
        JSR, 0x00, 0x04, // 0: -> 4
        RETURN, // 3 (never reached)
        0x4c,   // 4: astore_1
        ACONST_NULL, // 5
        ATHROW, // 6
    ]);
    let (constant_pool, options) = (HashMap::new(), Options::default());
    let graph = build(&method, &constant_pool, &options).unwrap();
    assert_eq!(parse_order(&graph), vec![0, 4]);
}

#[test]
fn ret_outside_subroutine() {
    let method = static_method(vec![RET, 0]);
    let (constant_pool, options) = (HashMap::new(), Options::default());
    match build(&method, &constant_pool, &options) {
        Err(Error::Bailout(reason)) => assert!(reason.contains("not parsing subroutine")),
        other => panic!("expected a bailout, got {:?}", other.map(|g| g.block_order)),
    }
}

#[test]
fn recursive_subroutine() {
    let method = static_method(vec![
        JSR, 0x00, 0x04, // 0: -> 4
        RETURN, // 3
        0x4c,   // 4: astore_1
        JSR, 0xff, 0xff, // 5: -> 4
        RET, 1, // 8
    ]);
    let (constant_pool, options) = (HashMap::new(), Options::default());
    match build(&method, &constant_pool, &options) {
        Err(Error::Bailout(reason)) => assert!(reason.contains("jsr/ret")),
        other => panic!("expected a bailout, got {:?}", other.map(|g| g.block_order)),
    }
}

#[test]
fn nested_subroutine_reuses_return_address_local() {
    let method = static_method(vec![
        JSR, 0x00, 0x04, // 0: -> 4
        RETURN, // 3
        0x4c,   // 4: astore_1
        JSR, 0x00, 0x05, // 5: -> 10
        RET, 1, // 8
        0x4c,   // 10: astore_1
        RET, 1, // 11
    ]);
    let (constant_pool, options) = (HashMap::new(), Options::default());
    match build(&method, &constant_pool, &options) {
        Err(Error::Bailout(reason)) => assert!(reason.contains("overwrites return address")),
        other => panic!("expected a bailout, got {:?}", other.map(|g| g.block_order)),
    }
}

#[test]
fn nested_subroutine_with_own_return_address_local() {
    let method = static_method(vec![
        JSR, 0x00, 0x04, // 0: -> 4
        RETURN, // 3
        0x4c,   // 4: astore_1
        JSR, 0x00, 0x05, // 5: -> 10
        RET, 1, // 8
        0x4d,   // 10: astore_2
        RET, 2, // 11
    ]);
    let (constant_pool, options) = (HashMap::new(), Options::default());
    let graph = build(&method, &constant_pool, &options).unwrap();
    assert_eq!(parse_order(&graph), vec![0, 4, 10, 8, 3]);

    let inner_ret = parsed_at(&graph, 10)[0];
    let outer_ret = parsed_at(&graph, 8)[0];
    assert_eq!(graph.block(inner_ret).end, Some(BlockEnd::Ret(outer_ret)));
    assert_eq!(
        graph.block(outer_ret).end,
        Some(BlockEnd::Ret(parsed_at(&graph, 3)[0]))
    );
}

#[test]
fn synchronized_method_gets_default_handler() {
    let mut method = static_method(vec![ICONST_1, POP, RETURN]);
    method.access_flags |= MethodAccessFlags::SYNCHRONIZED;
    let (constant_pool, options) = (HashMap::new(), Options::default());
    let graph = build(&method, &constant_pool, &options).unwrap();

    assert_eq!(graph.block_order.len(), 2);
    let (body, handler) = (graph.block_order[0], graph.block_order[1]);
    let handler_block = graph.block(handler);
    assert!(handler_block.check_block_flag(BlockFlags::DEFAULT_EXCEPTION_HANDLER));
    assert_eq!(handler_block.end, Some(BlockEnd::Throw));
    assert_eq!(graph.block(body).exception_handlers, vec![handler]);

    let scope_handlers = graph.scopes[0].exception_handlers().unwrap();
    assert!(scope_handlers[0].is_synchronization_entry());
    assert!(scope_handlers[0].is_catch_all());
}

#[test]
fn malformed_code() {
    let method = static_method(vec![GOTO, 0x00]);
    let (constant_pool, options) = (HashMap::new(), Options::default());
    assert!(matches!(
        build(&method, &constant_pool, &options),
        Err(Error::MalformedBytecode { bci: 0, .. })
    ));
}
