use retro80::MachineType;

fn usage() -> ! {
    eprintln!(
        "Usage: retro80 <machine> <rom-path>\n\
         Machines:\n\
         \x20 invaders  Space Invaders arcade (SDL window)\n\
         \x20 cpm       CP/M console program (headless)"
    );
    std::process::exit(1);
}

fn main() {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let (Some(machine), Some(rom_path)) = (args.next(), args.next()) else {
        usage();
    };

    let machine = match machine.as_str() {
        "invaders" | "space-invaders" | "space_invaders" => MachineType::Invaders,
        "cpm" | "CPM" => MachineType::Cpm,
        other => {
            eprintln!("Unknown machine '{other}'. Supported: invaders, cpm");
            std::process::exit(1);
        }
    };

    let rom = match std::fs::read(&rom_path) {
        Ok(rom) => rom,
        Err(e) => {
            eprintln!("Failed to read ROM '{rom_path}': {e}");
            std::process::exit(1);
        }
    };
    log::info!("loaded ROM '{rom_path}' ({} bytes)", rom.len());

    if let Err(e) = retro80::run(machine, &rom) {
        eprintln!("retro80: {e:#}");
        std::process::exit(1);
    }
}
