//! Wake-on-sound node. Read https://rtic.rs to learn more about the framework.
//!
//! The pipeline runs in `idle` and blocks on the RTC user channel, the
//! capacitor gate and the microphone. RTC0 resolves compare events; the
//! system channel drives the housekeeping heartbeat.

#![cfg_attr(target_os = "none", no_main)]
#![cfg_attr(target_os = "none", no_std)]

#[cfg(target_os = "none")]
use {defmt_rtt as _, panic_probe as _};

#[cfg(target_os = "none")]
#[rtic::app(device = nrf52833_hal::pac, peripherals = true, dispatchers = [SWI0_EGU0])]
mod app {
    use nrf52833_hal::gpiote::Gpiote;
    use wake_on_sound::board::{self, CapacitorGate, Uplink, Vm1010};
    use wake_on_sound::config::{HOUSEKEEPING_PERIOD_TICKS, PipelineConfig};
    use wake_on_sound::pipeline::{Buffers, Pipeline};
    use wake_on_sound::spectrum::RealFft;
    use wake_on_sound::timer::{SystemTimer, TimerIrq, TimerService, UserTimer, rtc::Rtc};

    type Node = Pipeline<
        'static,
        CapacitorGate<'static>,
        Vm1010<'static>,
        RealFft,
        Uplink,
        UserTimer<'static, Rtc>,
    >;

    #[shared]
    struct Shared {}

    #[local]
    struct Local {
        pipeline: Node,
        irq: TimerIrq<'static, Rtc>,
        system: SystemTimer<'static, Rtc>,
    }

    #[init(
        local = [
            timer: Option<TimerService<Rtc>> = None,
            gpiote: Option<Gpiote> = None,
            buffers: Buffers = Buffers::new(),
        ]
    )]
    fn init(cx: init::Context) -> (Shared, Local, init::Monotonics) {
        defmt::println!("Startup!");
        let mut core = cx.core;
        let device = cx.device;

        // GPIO sense events have to wake WFE without an enabled handler.
        core.SCB.set_sevonpend();

        let clocks = board::start_clocks(device.CLOCK);
        let Ok(rtc) = Rtc::start(device.RTC0) else {
            defmt::panic!("RTC0 rejected prescaler 0");
        };
        let service = cx.local.timer.insert(TimerService::new(rtc));
        let (user, mut system, irq) = service.split();
        system.arm(HOUSEKEEPING_PERIOD_TICKS);

        let gpiote = cx.local.gpiote.insert(Gpiote::new(device.GPIOTE));
        let (gate, mic, uplink) =
            board::split(device.P0, gpiote, device.SAADC, device.RADIO, clocks);

        let pipeline = Pipeline::new(
            gate,
            mic,
            RealFft,
            uplink,
            user,
            cx.local.buffers,
            PipelineConfig::default(),
        );

        (
            Shared {},
            Local {
                pipeline,
                irq,
                system,
            },
            init::Monotonics(),
        )
    }

    #[idle(local = [pipeline])]
    fn idle(cx: idle::Context) -> ! {
        cx.local.pipeline.run()
    }

    #[task(binds = RTC0, priority = 3, local = [irq])]
    fn rtc0(cx: rtc0::Context) {
        let fired = cx.local.irq.on_interrupt();
        if fired.system {
            housekeeping::spawn().ok();
        }
    }

    #[task(priority = 2, local = [system, beats: u32 = 0])]
    fn housekeeping(cx: housekeeping::Context) {
        let system = cx.local.system;
        if system.take_expired() {
            *cx.local.beats += 1;
            defmt::debug!("housekeeping #{}", *cx.local.beats);
            system.arm(HOUSEKEEPING_PERIOD_TICKS);
        }
    }
}

#[cfg(not(target_os = "none"))]
fn main() {}
