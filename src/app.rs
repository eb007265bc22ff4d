use crate::ui;
use cat_coin_flip::{
    GameController,
    GameSnapshot,
    PendingFlip,
    wallets::WalletConnector,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use std::time::Duration;
use tokio::time::{
    self,
    Instant,
    MissedTickBehavior,
};

const ANIMATION_TICK: Duration = Duration::from_millis(120);

pub async fn run_app<W: WalletConnector>(controller: GameController<W>) -> Result<()> {
    let mut ui_state = ui::UiState::default();
    let mut input_events = ui::input_event_stream();

    tracing::info!("Starting UI");
    ui::terminal_enter(&mut ui_state)?;
    let res = run_loop(controller, &mut ui_state, &mut input_events).await;
    ui::terminal_exit()?;
    res
}

fn show_processing_status<W: WalletConnector>(
    controller: &mut GameController<W>,
    ui_state: &mut ui::UiState,
    message: impl Into<String>,
    context: &'static str,
) -> Result<()> {
    controller.set_status(message);
    ui::draw(ui_state, &controller.snapshot()).wrap_err(context)
}

fn redraw<W: WalletConnector>(
    controller: &GameController<W>,
    ui_state: &mut ui::UiState,
    context: &'static str,
) -> Result<GameSnapshot> {
    let snapshot = controller.snapshot();
    ui::draw(ui_state, &snapshot).wrap_err(context)?;
    Ok(snapshot)
}

async fn run_loop<W: WalletConnector>(
    mut controller: GameController<W>,
    ui_state: &mut ui::UiState,
    input_events: &mut ui::InputEventStream,
) -> Result<()> {
    let mut ticker = time::interval(ANIMATION_TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut pending: Option<(PendingFlip, Instant)> = None;
    let mut last_snapshot = redraw(&controller, ui_state, "initial draw failed")?;

    loop {
        let deadline = pending
            .as_ref()
            .map_or_else(Instant::now, |(_, deadline)| *deadline);
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
            _ = time::sleep_until(deadline), if pending.is_some() => {
                if let Some((flip, _)) = pending.take() {
                    let landed = controller.draw_outcome();
                    let outcome = controller.resolve_flip(&flip, landed);
                    tracing::info!(?outcome, digest = %flip.digest, "flip resolved");
                }
                last_snapshot = redraw(&controller, ui_state, "draw after flip resolution failed")?;
            }
            _ = ticker.tick() => {
                let expired = controller.expire_notices(std::time::Instant::now());
                if last_snapshot.flipping || expired {
                    last_snapshot = controller.snapshot();
                    ui::advance_animation(ui_state, &last_snapshot);
                    ui::draw(ui_state, &last_snapshot)
                        .wrap_err("draw on animation tick failed")?;
                }
            }
            raw_ev = ui::next_raw_event(input_events) => {
                let Some(ev) = ui::interpret_event(ui_state, raw_ev?) else {
                    continue;
                };
                match ev {
                    ui::UserEvent::Quit => break,
                    ui::UserEvent::Select(side) => controller.select(side),
                    ui::UserEvent::ToggleInstructions => controller.toggle_instructions(),
                    ui::UserEvent::DismissNotice => {
                        controller.dismiss_notice();
                    }
                    ui::UserEvent::Connect => controller.connect(),
                    ui::UserEvent::Disconnect => controller.disconnect(),
                    ui::UserEvent::Flip => {
                        if pending.is_none() && !last_snapshot.flipping {
                            show_processing_status(
                                &mut controller,
                                ui_state,
                                "Submitting flip...",
                                "draw while submitting flip failed",
                            )?;
                            if let Some(flip) = controller.submit_flip().await {
                                let deadline = Instant::now() + flip.delay;
                                pending = Some((flip, deadline));
                            }
                        }
                    }
                    ui::UserEvent::Claim => {
                        show_processing_status(
                            &mut controller,
                            ui_state,
                            "Claiming free coins...",
                            "draw while submitting claim failed",
                        )?;
                        let outcome = controller.request_claim().await;
                        tracing::debug!(?outcome, "claim finished");
                    }
                    ui::UserEvent::Redraw => {}
                }
                last_snapshot = redraw(&controller, ui_state, "draw after input failed")?;
            }
        }
    }
    Ok(())
}
