use blockfield_common::{BlockLoc, BlockType, CuboidAddr, EntityId, Orientation};
use blockfield_net::{InboundTransfer, OutboundTransfer};
use blockfield_persist::WorldStore;
use blockfield_sim::{BlockMutation, Entity, SimConfig, TickEngine, WorldState};
use blockfield_store::Cuboid;
use clap::{Parser, Subcommand};
use glam::Vec3;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "blockfield-cli", about = "CLI tool for blockfield worlds")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and default configuration
    Info,
    /// Run a deterministic tick demo, twice, and compare state hashes
    Tick {
        /// Number of ticks to simulate
        #[arg(short, long, default_value = "20")]
        ticks: u64,
        /// Engine seed
        #[arg(short, long, default_value = "42")]
        seed: u64,
    },
    /// Save a demo world to disk, reload it, and verify integrity
    Save {
        /// Store directory
        #[arg(short, long, default_value = "blockfield_data")]
        path: String,
    },
    /// Stream a cuboid through the fragment transfer protocol
    Transfer {
        /// Fragment size in bytes
        #[arg(short, long, default_value = "64")]
        fragment: usize,
    },
}

/// A flat demo world: one cuboid with a stone floor and one player.
fn demo_world() -> WorldState {
    let mut world = WorldState::new();
    let mut cuboid = Cuboid::all_air();
    for x in 0..32u8 {
        for y in 0..32u8 {
            cuboid.set_block_type(BlockLoc::new(x as i64, y as i64, 0).local(), BlockType::STONE);
        }
    }
    world.insert_cuboid(CuboidAddr::new(0, 0, 0), cuboid);
    world.insert_entity(Entity::player(EntityId(1), Vec3::new(16.0, 16.0, 1.0), 200));
    world
}

fn demo_submissions(engine: &mut TickEngine) {
    engine.submit_mutation(BlockMutation::Place {
        at: BlockLoc::new(8, 8, 1),
        block: BlockType::WOOD,
        orientation: Orientation::default(),
    });
    engine.submit_mutation(BlockMutation::Place {
        at: BlockLoc::new(8, 9, 1),
        block: BlockType::SAPLING,
        orientation: Orientation::default(),
    });
    engine.submit_mutation(BlockMutation::Burn {
        at: BlockLoc::new(8, 8, 1),
    });
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("blockfield-cli v{}", env!("CARGO_PKG_VERSION"));
            let config = SimConfig::default();
            println!(
                "tick: {} ms, gravity: {} blocks/s², max speed: {} blocks/s",
                config.millis_per_tick, config.gravity, config.max_speed
            );
            println!(
                "growth delay: {} ms, burn delay: {} ms",
                config.growth_delay_ms, config.burn_delay_ms
            );
        }
        Commands::Tick { ticks, seed } => {
            println!("Deterministic tick demo: seed={seed}, ticks={ticks}");

            let run = || {
                let mut world = demo_world();
                let mut engine = TickEngine::with_seed(SimConfig::default(), seed);
                demo_submissions(&mut engine);
                let mut applied = 0;
                for _ in 0..ticks {
                    let delta = engine.run_tick(&mut world);
                    applied += delta.stats.mutations_applied;
                }
                (world.state_hash(), applied)
            };

            let (hash_a, applied_a) = run();
            let (hash_b, _) = run();
            println!("Run 1: hash={hash_a:#018x}, mutations applied={applied_a}");
            println!("Run 2: hash={hash_b:#018x}");
            println!(
                "Match: {}",
                if hash_a == hash_b { "OK" } else { "MISMATCH" }
            );
        }
        Commands::Save { path } => {
            let mut world = demo_world();
            let mut engine = TickEngine::with_seed(SimConfig::default(), 7);
            demo_submissions(&mut engine);
            for _ in 0..5 {
                engine.run_tick(&mut world);
            }

            let mut store = WorldStore::open(&path)?;
            store.take_save(&world, &engine)?;
            store.verify_integrity()?;
            println!(
                "Saved tick {} to {path} (save #{})",
                world.tick(),
                store.meta().save_count
            );

            let (loaded, _engine) = store.load_latest()?;
            println!(
                "Reload: tick={}, hash match: {}",
                loaded.tick(),
                if loaded.state_hash() == world.state_hash() {
                    "OK"
                } else {
                    "MISMATCH"
                }
            );
        }
        Commands::Transfer { fragment } => {
            let world = demo_world();
            let addr = CuboidAddr::new(0, 0, 0);
            let cuboid = world.cuboid(addr).expect("demo cuboid");

            let mut out = OutboundTransfer::new(addr, cuboid);
            let mut inbound = InboundTransfer::new();
            println!(
                "Transferring cuboid {addr:?}: {} bytes in {}-byte fragments",
                out.total_len(),
                fragment
            );

            let mut messages = 0;
            let mut result = None;
            while let Some(msg) = out.next_message(fragment) {
                messages += 1;
                if let Some(done) = inbound.accept(msg)? {
                    result = Some(done);
                }
            }
            let (got_addr, got) = result.expect("transfer incomplete");
            println!(
                "Delivered in {messages} messages, cuboid match: {}",
                if got_addr == addr && &got == cuboid.as_ref() {
                    "OK"
                } else {
                    "MISMATCH"
                }
            );
        }
    }

    Ok(())
}
