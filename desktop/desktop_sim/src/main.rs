/*
 *  Copyright (C) 2025  Markus Elias Gerber
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  You should have received a copy of the GNU General Public License
 *  along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use std::{env, fs, process::ExitCode, thread, time::Duration};

use env_logger::{Builder, Env};
use log::{error, info};
use os_sim::{OSSimConfig, OSSimulator};

/// Wall time the batch spawner runs if nothing else is given
const DEFAULT_RUN_MILLIS: u64 = 2000;

fn load_config(path: Option<String>) -> Result<OSSimConfig, String> {
    let path = match path {
        Some(path) => path,
        None => return Ok(OSSimConfig::default()),
    };

    let text = fs::read_to_string(&path).map_err(|err| format!("could not read {}: {}", path, err))?;
    serde_json::from_str(&text).map_err(|err| format!("could not parse {}: {}", path, err))
}

fn main() -> ExitCode {
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_module_path(false)
        .init();

    // usage: desktop_sim [config.json] [run millis]
    let mut args = env::args().skip(1);
    let config = match load_config(args.next()) {
        Ok(config) => config,
        Err(err) => {
            error!("{}", err);
            return ExitCode::FAILURE;
        }
    };
    let run_millis = match args.next().map(|arg| arg.parse::<u64>()) {
        None => DEFAULT_RUN_MILLIS,
        Some(Ok(millis)) => millis,
        Some(Err(err)) => {
            error!("invalid run time: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let simulator = OSSimulator::new();
    if let Err(err) = simulator.initialize(config) {
        error!("{}", err);
        return ExitCode::FAILURE;
    }

    if let Err(err) = simulator.start_batch_spawner() {
        error!("{}", err);
        return ExitCode::FAILURE;
    }
    thread::sleep(Duration::from_millis(run_millis));
    simulator.stop_batch_spawner();

    let snapshot = match simulator.snapshot() {
        Some(snapshot) => snapshot,
        None => {
            error!("simulator is not initialized anymore");
            return ExitCode::FAILURE;
        }
    };

    info!(
        "{} processes created, {} finished, cpu utilization {:.0}%",
        simulator.processes().len(),
        snapshot.finished.len(),
        snapshot.cpu_utilization
    );

    match serde_json::to_string_pretty(&snapshot) {
        Ok(json) => println!("{}", json),
        Err(err) => {
            error!("could not serialize report: {}", err);
            simulator.shutdown();
            return ExitCode::FAILURE;
        }
    }

    simulator.shutdown();
    ExitCode::SUCCESS
}
