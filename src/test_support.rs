//! Recording device doubles shared by the service and session tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::device::{
    AudioInput, AudioOutput, FixMode, GpsFix, InputDevice, InputEvent, KeyCode, Margins, MediaOutput,
    SensorProvider, Size, VideoFrameRate, VideoOutput, VideoResolution,
};
use crate::transport::Timestamp;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DeviceCall {
    Open,
    Init,
    Start,
    Suspend,
    Stop,
    Write {
        timestamp: Option<Timestamp>,
        payload: Bytes,
    },
}

#[derive(Default)]
struct CallLog {
    calls: Mutex<Vec<DeviceCall>>,
}

impl CallLog {
    fn push(&self, call: DeviceCall) {
        self.calls.lock().expect("call log poisoned").push(call);
    }

    fn snapshot(&self) -> Vec<DeviceCall> {
        self.calls.lock().expect("call log poisoned").clone()
    }
}

pub(crate) struct MockAudioOutput {
    log: CallLog,
    params: Mutex<(u32, u32, u32)>,
    open_ok: AtomicBool,
}

impl MockAudioOutput {
    pub(crate) fn new(sample_rate: u32, sample_size: u32, channels: u32) -> Arc<Self> {
        Arc::new(Self {
            log: CallLog::default(),
            params: Mutex::new((sample_rate, sample_size, channels)),
            open_ok: AtomicBool::new(true),
        })
    }

    pub(crate) fn reconfigure(&self, sample_rate: u32, sample_size: u32, channels: u32) {
        *self.params.lock().expect("params poisoned") = (sample_rate, sample_size, channels);
    }

    pub(crate) fn fail_open(&self) {
        self.open_ok.store(false, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> Vec<DeviceCall> {
        self.log.snapshot()
    }
}

#[async_trait]
impl MediaOutput for MockAudioOutput {
    fn open(&self) -> bool {
        self.log.push(DeviceCall::Open);
        self.open_ok.load(Ordering::SeqCst)
    }

    fn start(&self) {
        self.log.push(DeviceCall::Start);
    }

    fn suspend(&self) {
        self.log.push(DeviceCall::Suspend);
    }

    fn stop(&self) {
        self.log.push(DeviceCall::Stop);
    }

    async fn write(&self, timestamp: Option<Timestamp>, payload: Bytes) {
        self.log.push(DeviceCall::Write { timestamp, payload });
    }
}

impl AudioOutput for MockAudioOutput {
    fn sample_rate(&self) -> u32 {
        self.params.lock().expect("params poisoned").0
    }

    fn sample_size(&self) -> u32 {
        self.params.lock().expect("params poisoned").1
    }

    fn channel_count(&self) -> u32 {
        self.params.lock().expect("params poisoned").2
    }
}

pub(crate) struct MockVideoOutput {
    log: CallLog,
    init_ok: AtomicBool,
    write_delay: Mutex<Duration>,
}

impl MockVideoOutput {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            log: CallLog::default(),
            init_ok: AtomicBool::new(true),
            write_delay: Mutex::new(Duration::ZERO),
        })
    }

    pub(crate) fn set_init_ok(&self, ok: bool) {
        self.init_ok.store(ok, Ordering::SeqCst);
    }

    pub(crate) fn set_write_delay(&self, delay: Duration) {
        *self.write_delay.lock().expect("delay poisoned") = delay;
    }

    pub(crate) fn calls(&self) -> Vec<DeviceCall> {
        self.log.snapshot()
    }
}

#[async_trait]
impl MediaOutput for MockVideoOutput {
    fn open(&self) -> bool {
        self.log.push(DeviceCall::Open);
        true
    }

    fn start(&self) {
        self.log.push(DeviceCall::Start);
    }

    fn suspend(&self) {
        self.log.push(DeviceCall::Suspend);
    }

    fn stop(&self) {
        self.log.push(DeviceCall::Stop);
    }

    async fn write(&self, timestamp: Option<Timestamp>, payload: Bytes) {
        let delay = *self.write_delay.lock().expect("delay poisoned");
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.log.push(DeviceCall::Write { timestamp, payload });
    }
}

impl VideoOutput for MockVideoOutput {
    fn init(&self) -> bool {
        self.log.push(DeviceCall::Init);
        self.init_ok.load(Ordering::SeqCst)
    }

    fn resolution(&self) -> VideoResolution {
        VideoResolution::R800x480
    }

    fn frame_rate(&self) -> VideoFrameRate {
        VideoFrameRate::Fps30
    }

    fn dpi(&self) -> u32 {
        140
    }

    fn margins(&self) -> Margins {
        Margins {
            width: 0,
            height: 0,
        }
    }
}

pub(crate) struct MockInputDevice {
    keycodes: Vec<KeyCode>,
    touchscreen: Option<Size>,
    sender: Mutex<Option<mpsc::Sender<InputEvent>>>,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl MockInputDevice {
    pub(crate) fn new(keycodes: Vec<KeyCode>, touchscreen: Option<Size>) -> Arc<Self> {
        Arc::new(Self {
            keycodes,
            touchscreen,
            sender: Mutex::new(None),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
        })
    }

    /// Pushes a local event into the stream handed out by the last `start`.
    pub(crate) async fn emit(&self, event: InputEvent) {
        let sender = self.sender.lock().expect("sender poisoned").clone();
        sender
            .expect("input device started")
            .send(event)
            .await
            .expect("input stream open");
    }

    pub(crate) fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub(crate) fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl InputDevice for MockInputDevice {
    fn start(&self) -> mpsc::Receiver<InputEvent> {
        let (tx, rx) = mpsc::channel(32);
        *self.sender.lock().expect("sender poisoned") = Some(tx);
        self.starts.fetch_add(1, Ordering::SeqCst);
        rx
    }

    fn stop(&self) {
        self.sender.lock().expect("sender poisoned").take();
        self.stops.fetch_add(1, Ordering::SeqCst);
    }

    fn supported_keycodes(&self) -> Vec<KeyCode> {
        self.keycodes.clone()
    }

    fn touchscreen(&self) -> Option<Size> {
        self.touchscreen
    }
}

pub(crate) struct MockAudioInput {
    start_ok: AtomicBool,
    sender: Mutex<Option<mpsc::Sender<Bytes>>>,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl MockAudioInput {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            start_ok: AtomicBool::new(true),
            sender: Mutex::new(None),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
        })
    }

    pub(crate) fn fail_start(&self) {
        self.start_ok.store(false, Ordering::SeqCst);
    }

    /// Pushes a captured chunk into the stream handed out by the last `start`.
    pub(crate) async fn emit(&self, chunk: &'static [u8]) {
        let sender = self.sender.lock().expect("sender poisoned").clone();
        sender
            .expect("capture started")
            .send(Bytes::from_static(chunk))
            .await
            .expect("capture stream open");
    }

    pub(crate) fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub(crate) fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl AudioInput for MockAudioInput {
    fn open(&self) -> bool {
        true
    }

    fn start(&self) -> Option<mpsc::Receiver<Bytes>> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        if !self.start_ok.load(Ordering::SeqCst) {
            return None;
        }
        let (tx, rx) = mpsc::channel(32);
        *self.sender.lock().expect("sender poisoned") = Some(tx);
        Some(rx)
    }

    fn stop(&self) {
        self.sender.lock().expect("sender poisoned").take();
        self.stops.fetch_add(1, Ordering::SeqCst);
    }

    fn sample_rate(&self) -> u32 {
        16_000
    }

    fn sample_size(&self) -> u32 {
        16
    }

    fn channel_count(&self) -> u32 {
        1
    }
}

pub(crate) struct MockSensorProvider {
    connect_ok: AtomicBool,
    night: AtomicBool,
    fix: Mutex<Option<GpsFix>>,
    location_delay: Mutex<Duration>,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    night_polls: AtomicUsize,
    location_polls: AtomicUsize,
}

impl MockSensorProvider {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            connect_ok: AtomicBool::new(true),
            night: AtomicBool::new(false),
            fix: Mutex::new(None),
            location_delay: Mutex::new(Duration::ZERO),
            connects: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            night_polls: AtomicUsize::new(0),
            location_polls: AtomicUsize::new(0),
        })
    }

    pub(crate) fn set_night(&self, night: bool) {
        self.night.store(night, Ordering::SeqCst);
    }

    pub(crate) fn set_fix(&self, fix: Option<GpsFix>) {
        *self.fix.lock().expect("fix poisoned") = fix;
    }

    pub(crate) fn set_location_delay(&self, delay: Duration) {
        *self.location_delay.lock().expect("delay poisoned") = delay;
    }

    pub(crate) fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub(crate) fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub(crate) fn location_polls(&self) -> usize {
        self.location_polls.load(Ordering::SeqCst)
    }

    pub(crate) fn night_polls(&self) -> usize {
        self.night_polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SensorProvider for MockSensorProvider {
    fn connect(&self) -> bool {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.connect_ok.load(Ordering::SeqCst)
    }

    fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }

    async fn night_mode(&self) -> bool {
        self.night_polls.fetch_add(1, Ordering::SeqCst);
        self.night.load(Ordering::SeqCst)
    }

    async fn location(&self) -> Option<GpsFix> {
        self.location_polls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.location_delay.lock().expect("delay poisoned");
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        *self.fix.lock().expect("fix poisoned")
    }
}

pub(crate) fn sample_fix() -> GpsFix {
    GpsFix {
        mode: FixMode::Fix3d,
        time_s: Some(1_700_000_000),
        latitude: Some(48.137_154),
        longitude: Some(11.576_124),
        epx: 1.0,
        epy: 1.0,
        altitude_m: Some(519.0),
        speed_mps: Some(0.0),
        track_deg: Some(0.0),
    }
}
