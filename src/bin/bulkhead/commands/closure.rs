//! `bulkhead closure` command

use anyhow::Result;

use super::context;
use crate::cli::{ClosureArgs, GlobalOpts};
use bulkhead::core::ExportTier;
use bulkhead::interface::emit;
use bulkhead::ops::{closure_entries, explain_symbol, Analysis};
use bulkhead::util::QualifiedName;

pub fn execute(args: ClosureArgs, global: GlobalOpts) -> Result<()> {
    let ctx = context(global, &args.input)?;
    let analysis = Analysis::load(&ctx)?;

    let tier = if args.test {
        ExportTier::TestOnly
    } else {
        ExportTier::Public
    };
    let package = QualifiedName::new(&args.package);
    let closure = analysis.closure_for(package, tier)?;

    if let Some(symbol) = &args.explain {
        let steps = explain_symbol(&analysis, &closure, symbol)?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&steps)?);
            return Ok(());
        }

        for (i, step) in steps.iter().enumerate() {
            match step.edge {
                None => println!("{} (export of {})", step.symbol, package),
                Some(edge) => println!("{}└─ {} ({})", "   ".repeat(i.saturating_sub(1)), step.symbol, edge),
            }
        }
        return Ok(());
    }

    if args.stub {
        let artifact = emit(&analysis.table, &analysis.graph, &closure);
        if args.json {
            print!("{}", artifact.render_json()?);
        } else {
            print!("{}", artifact.render_stub());
        }
        return Ok(());
    }

    let entries = closure_entries(&analysis, &closure);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    println!("{} ({}): {} symbols", package, tier.as_str(), entries.len());
    for entry in &entries {
        let owner = match entry.owner {
            Some(owner) if owner != package => format!(" [{}]", owner),
            _ => String::new(),
        };
        let origin = match entry.via {
            None if entry.seed => "export".to_string(),
            None => String::new(),
            Some((from, edge)) => format!("{} of {}", edge, from),
        };
        println!(
            "  {:<10} {:<5} {}{}  ← {}",
            entry.kind.as_str(),
            entry.reach.to_string(),
            entry.symbol,
            owner,
            origin
        );
    }

    Ok(())
}
