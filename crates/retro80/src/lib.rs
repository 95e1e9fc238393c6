use anyhow::Result;
use retro80_common::app::App;
use retro80_sdl2::{SdlContext, SdlInitInfo};

/// Which machine the ROM image is for.
pub enum MachineType {
    Invaders,
    Cpm,
}

pub fn run(machine: MachineType, rom_data: &[u8]) -> Result<()> {
    match machine {
        MachineType::Invaders => run_invaders(rom_data),
        MachineType::Cpm => run_cpm(rom_data),
    }
}

/// Run the arcade machine under the SDL2 frontend.
pub fn run_invaders(rom_data: &[u8]) -> Result<()> {
    let mut app = retro80_invaders::InvadersApp::default();
    app.machine.load_rom(rom_data)?;
    let init_info = SdlInitInfo::builder()
        .width(app.width())
        .height(app.height())
        .scale(app.scale())
        .title(app.title())
        .build();
    SdlContext::run(init_info, app)
}

/// Run a CP/M program headless on the process console.
pub fn run_cpm(rom_data: &[u8]) -> Result<()> {
    let mut machine = retro80_cpm::CpmMachine::new(rom_data)?;
    machine.run()
}
