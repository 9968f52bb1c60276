use bcgraph::bytecode::{Method, MethodAccessFlags};
use bcgraph::graph::GraphBuilder;
use bcgraph::ir::{ExceptionHandler, IrGraph, SYNCHRONIZATION_ENTRY_BCI};
use bcgraph::*;

use clap::{value_parser, Arg, ArgAction, Command};
use std::collections::HashMap;
use std::fs;

fn main() -> Result<(), Error> {
    env_logger::init();

    let matches = Command::new("Bytecode block graph builder")
        .version(clap::crate_version!())
        .about("Parses the code of a JVM method into basic blocks and prints them")
        .arg(
            Arg::new("handler")
                .long("handler")
                .value_name("START:END:HANDLER[:CATCH]")
                .help("Adds an exception table entry (catch type 0 catches everything)")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("synchronized")
                .long("synchronized")
                .help("Treats the method as synchronized")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("max blocks")
                .long("max-blocks")
                .value_name("N")
                .help("Gives up after parsing this many blocks")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("hex")
                .long("hex")
                .help("Reads the input as hexadecimal text instead of raw bytes")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("INPUT")
                .help("File containing the code array of the method")
                .required(true)
                .index(1),
        )
        .get_matches();

    let mut options = Options::default();
    if let Some(max_blocks) = matches.get_one::<usize>("max blocks") {
        options.maximum_block_count = *max_blocks;
    }

    let input = matches
        .get_one::<String>("INPUT")
        .ok_or_else(|| Error::InvalidArgument(String::from("missing input file")))?;
    log::info!("Reading '{}'", input);
    let bytes = fs::read(input)?;
    let code = if matches.get_flag("hex") {
        parse_hex(&bytes)?
    } else {
        bytes
    };

    let mut access_flags = MethodAccessFlags::STATIC;
    if matches.get_flag("synchronized") {
        access_flags |= MethodAccessFlags::SYNCHRONIZED;
    }
    let mut method = Method::new(input.as_str(), access_flags, code);
    if let Some(handlers) = matches.get_many::<String>("handler") {
        for handler in handlers {
            method.exception_table.push(parse_handler(handler)?);
        }
    }

    let constant_pool: HashMap<u16, String> = HashMap::new();
    let graph = GraphBuilder::new(&method, &constant_pool, &options).build()?;
    print_graph(&graph);

    Ok(())
}

/// Parse `START:END:HANDLER[:CATCH]`
fn parse_handler(spec: &str) -> Result<ExceptionHandler, Error> {
    let invalid = || Error::InvalidArgument(format!("bad handler '{}'", spec));
    let parts = spec
        .split(':')
        .map(|part| part.trim().parse::<usize>().map_err(|_| invalid()))
        .collect::<Result<Vec<usize>, Error>>()?;
    match parts[..] {
        [start, end, handler] => Ok(ExceptionHandler::new(start, end, handler, 0)),
        [start, end, handler, catch_type] => {
            let catch_type = u16::try_from(catch_type).map_err(|_| invalid())?;
            Ok(ExceptionHandler::new(start, end, handler, catch_type))
        }
        _ => Err(invalid()),
    }
}

/// Decode hex text, ignoring whitespace
fn parse_hex(text: &[u8]) -> Result<Vec<u8>, Error> {
    let digits: Vec<u8> = text
        .iter()
        .copied()
        .filter(|byte| !byte.is_ascii_whitespace())
        .collect();
    hex::decode(digits).map_err(|err| Error::InvalidArgument(format!("bad hex input: {}", err)))
}

fn print_graph(graph: &IrGraph) {
    for block_id in &graph.block_order {
        let block = graph.block(*block_id);
        let bci = if block.bci == SYNCHRONIZATION_ENTRY_BCI {
            String::from("sync")
        } else {
            block.bci.to_string()
        };
        let successors = block
            .end
            .as_ref()
            .map_or_else(Vec::new, |end| end.successors());
        println!(
            "{:?} bci={} dfn={} flags={:?} instructions={} successors={:?} handlers={:?}",
            block_id,
            bci,
            block.depth_first_number,
            block.flags,
            block.instructions.len(),
            successors,
            block.exception_handlers
        );
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hex_input_ignores_whitespace() {
        assert_eq!(parse_hex(b"04 57\nb1").unwrap(), vec![0x04, 0x57, 0xb1]);
        assert!(matches!(parse_hex(b"0"), Err(Error::InvalidArgument(_))));
        assert!(matches!(parse_hex(b"zz"), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn handler_arguments() {
        let handler = parse_handler("0:3:3").unwrap();
        assert_eq!(handler, ExceptionHandler::new(0, 3, 3, 0));
        let handler = parse_handler("1:4:6:12").unwrap();
        assert_eq!(handler.catch_type, 12);
        assert!(parse_handler("1:4").is_err());
        assert!(parse_handler("1:4:6:70000").is_err());
    }
}
