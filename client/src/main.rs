use clap::Parser;
use client::network::{Session, SessionEvent};
use client::remote::{LocalPlayer, RemoteWorld};
use log::{debug, info, warn};
use shared::protocol::AttackEvent;
use shared::{now_ms, ATTACK_COOLDOWN, MAP_HEIGHT, MAP_WIDTH, NETWORK_UPDATE_RATE, SERVER_PORT};
use std::time::Duration;
use tokio::time::interval;

/// Headless client that joins a server, orbits the map center and logs
/// what it sees. Useful for exercising a server without the game UI.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1")]
    server: String,

    /// Server port
    #[arg(short, long, default_value_t = SERVER_PORT)]
    port: u16,

    /// Player display name
    #[arg(short, long, default_value = "observer")]
    name: String,

    /// Skin variant (1 or 2)
    #[arg(long, default_value = "1")]
    skin: u32,

    /// State transmissions per second
    #[arg(short, long, default_value_t = NETWORK_UPDATE_RATE)]
    rate: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Connecting to {}:{} as {}", args.server, args.port, args.name);
    let mut session =
        Session::connect_with_rate(&args.server, args.port, args.skin, &args.name, args.rate)
            .await?;

    let mut local = LocalPlayer::new(args.skin, &args.name);
    let mut world = RemoteWorld::new();
    let mut ticker = interval(Duration::from_millis(16));
    let mut last_report = now_ms();

    loop {
        tokio::select! {
            event = session.next_event() => {
                match event {
                    Some(SessionEvent::Players(players)) => {
                        world.apply_snapshot(&players, session.player_id(), &mut local, now_ms());
                        debug!("Snapshot with {} player(s)", players.len());
                    }
                    Some(SessionEvent::Attack(event)) => {
                        debug!("Attack at ({:.1}, {:.1})", event.x, event.y);
                    }
                    Some(SessionEvent::Message(line)) => {
                        debug!("Unhandled server line: {}", line);
                    }
                    Some(SessionEvent::ConnectionLost) => {
                        warn!("Connection lost");
                        break;
                    }
                    None => break,
                }
            }

            _ = ticker.tick() => {
                let now = now_ms();
                local.try_respawn(now);
                local.integrate(now);
                world.tick(now);

                // Trace a slow orbit around the map center.
                let phase = (now % 10_000) as f64 / 10_000.0 * std::f64::consts::TAU;
                local.x = MAP_WIDTH / 2.0 + 200.0 * phase.cos();
                local.y = MAP_HEIGHT / 2.0 + 150.0 * phase.sin();
                local.angle = phase + std::f64::consts::FRAC_PI_2;

                // Swing periodically so attack traffic flows too.
                if !local.is_dead() && now.saturating_sub(local.last_attack_time) >= 3 * ATTACK_COOLDOWN {
                    local.attacking = true;
                    local.last_attack_time = now;
                    session.send_attack(&AttackEvent {
                        x: local.x,
                        y: local.y,
                        angle: local.angle,
                        skin_id: local.skin_id,
                    });
                } else if local.attacking
                    && now.saturating_sub(local.last_attack_time) >= ATTACK_COOLDOWN
                {
                    local.attacking = false;
                }

                session.publish_state(local.as_update());

                if now.saturating_sub(last_report) >= 5_000 {
                    info!(
                        "Tracking {} remote player(s), local health {}",
                        world.len(),
                        local.health
                    );
                    last_report = now;
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Disconnecting");
                session.disconnect();
                break;
            }
        }
    }

    Ok(())
}
