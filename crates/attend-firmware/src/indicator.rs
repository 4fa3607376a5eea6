//! Single status LED.

use embassy_time::Timer;
use esp_hal::gpio::Output;

use attend_core::indicator::StatusIndicator;

const SUCCESS_ON_MS: u64 = 600;
const FAILURE_BLINKS: u32 = 3;
const FAILURE_BLINK_MS: u64 = 120;

pub struct LedIndicator<'d> {
    led: Output<'d>,
}

impl<'d> LedIndicator<'d> {
    pub fn new(led: Output<'d>) -> Self {
        Self { led }
    }
}

impl StatusIndicator for LedIndicator<'_> {
    /// One long flash.
    async fn success(&mut self) {
        self.led.set_high();
        Timer::after_millis(SUCCESS_ON_MS).await;
        self.led.set_low();
    }

    /// Three short flashes.
    async fn failure(&mut self) {
        for _ in 0..FAILURE_BLINKS {
            self.led.set_high();
            Timer::after_millis(FAILURE_BLINK_MS).await;
            self.led.set_low();
            Timer::after_millis(FAILURE_BLINK_MS).await;
        }
    }

    async fn waiting(&mut self, on: bool) {
        if on {
            self.led.set_high();
        } else {
            self.led.set_low();
        }
    }
}
