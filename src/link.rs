//! Capa de enlace serie: framing de comandos entrantes y cadencia de
//! streaming de instantáneas del trazo hacia el dispositivo emparejado.

use crossbeam_channel::Sender;

use crate::types::{
    CMD_LINK_DOWN, CMD_LINK_UP, COMMAND_CAPACITY, LINK_END_MARKER, LINK_START_MARKER,
    STREAM_PERIOD_CYCLES,
};
use crate::wire::StrokeWireRecord;

/// Una trama de comando completa, ya sin marcadores
#[derive(Debug, Clone, PartialEq)]
pub struct CommandFrame {
    bytes: Vec<u8>,
}

impl CommandFrame {
    /// Payload como texto ASCII terminado en NUL: todo lo posterior al
    /// primer NUL se ignora.
    pub fn text(&self) -> String {
        let end = self
            .bytes
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.bytes.len());
        String::from_utf8_lossy(&self.bytes[..end]).into_owned()
    }
}

/// Comandos que el dispositivo emparejado puede enviar
#[derive(Debug, Clone, PartialEq)]
pub enum LinkCommand {
    /// El enlace quedó establecido
    LinkUp,
    /// El enlace se cayó
    LinkDown,
    /// Trama válida pero sin efecto sobre el estado
    Other(String),
}

impl LinkCommand {
    pub fn parse(frame: &CommandFrame) -> Self {
        let text = frame.text();
        match text.as_str() {
            CMD_LINK_UP => LinkCommand::LinkUp,
            CMD_LINK_DOWN => LinkCommand::LinkDown,
            _ => LinkCommand::Other(text),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FramerState {
    /// Buscando el marcador de inicio
    Scanning,
    /// Acumulando payload hasta el marcador de fin
    Capturing,
}

/// Máquina de estados que arma tramas de comando desde el flujo de bytes.
/// Una trama que alcanza la capacidad del buffer se descarta entera y la
/// máquina resincroniza buscando el próximo marcador de inicio.
pub struct CommandFramer {
    state: FramerState,
    payload: Vec<u8>,
    prev: u8,
}

impl CommandFramer {
    pub fn new() -> Self {
        Self {
            state: FramerState::Scanning,
            payload: Vec::with_capacity(COMMAND_CAPACITY),
            prev: 0,
        }
    }

    /// Alimenta un byte recibido; devuelve la trama cuando queda completa
    pub fn push_byte(&mut self, byte: u8) -> Option<CommandFrame> {
        let mut completed = None;

        match self.state {
            FramerState::Scanning => {
                if self.prev == LINK_START_MARKER[0] && byte == LINK_START_MARKER[1] {
                    self.state = FramerState::Capturing;
                    self.payload.clear();
                }
            }

            FramerState::Capturing => {
                if self.payload.len() >= COMMAND_CAPACITY {
                    // Desborde: trama descartada, a resincronizar
                    self.payload.clear();
                    self.state = FramerState::Scanning;
                } else {
                    self.payload.push(byte);
                    if self.prev == LINK_END_MARKER[0] && byte == LINK_END_MARKER[1] {
                        // Quitar los dos bytes del marcador de fin
                        self.payload.truncate(self.payload.len() - 2);
                        completed = Some(CommandFrame {
                            bytes: std::mem::take(&mut self.payload),
                        });
                        self.state = FramerState::Scanning;
                    }
                }
            }
        }

        self.prev = byte;
        completed
    }

    /// Estado actual del framer (para depuración)
    pub fn state(&self) -> &str {
        match self.state {
            FramerState::Scanning => "SCANNING",
            FramerState::Capturing => "CAPTURING",
        }
    }
}

impl Default for CommandFramer {
    fn default() -> Self {
        Self::new()
    }
}

/// Cadencia de salida: con enlace activo emite una instantánea cada
/// `STREAM_PERIOD_CYCLES` ciclos de giroscopio. El contador se reinicia
/// mientras no hay enlace, así el primer ciclo tras reconectar emite de
/// inmediato. El envío es `try_send` sobre un canal acotado: canal lleno
/// significa registro descartado, nunca un lazo de muestreo bloqueado.
pub struct StrokeStreamer {
    tx: Sender<StrokeWireRecord>,
    send_index: u32,
}

impl StrokeStreamer {
    pub fn new(tx: Sender<StrokeWireRecord>) -> Self {
        Self { tx, send_index: 0 }
    }

    /// Avanza un ciclo; devuelve true si tocaba emitir en este ciclo
    pub fn on_cycle(&mut self, linked: bool, snapshot: impl FnOnce() -> StrokeWireRecord) -> bool {
        if !linked {
            self.send_index = 0;
            return false;
        }

        let emit = self.send_index % STREAM_PERIOD_CYCLES == 0;
        self.send_index = self.send_index.wrapping_add(1);
        if emit {
            let _ = self.tx.try_send(snapshot());
        }
        emit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    fn framed(payload: &[u8]) -> Vec<u8> {
        let mut bytes = LINK_START_MARKER.to_vec();
        bytes.extend_from_slice(payload);
        bytes.extend_from_slice(&LINK_END_MARKER);
        bytes
    }

    fn feed(framer: &mut CommandFramer, bytes: &[u8]) -> Vec<CommandFrame> {
        bytes.iter().filter_map(|&b| framer.push_byte(b)).collect()
    }

    #[test]
    fn test_connect_command_parses() {
        let mut framer = CommandFramer::new();
        let frames = feed(&mut framer, &framed(b"IND=BLECONNECTED"));

        assert_eq!(frames.len(), 1);
        assert_eq!(LinkCommand::parse(&frames[0]), LinkCommand::LinkUp);
    }

    #[test]
    fn test_disconnect_command_parses() {
        let mut framer = CommandFramer::new();
        let frames = feed(&mut framer, &framed(b"IND=BLEDISCONNECTED"));

        assert_eq!(frames.len(), 1);
        assert_eq!(LinkCommand::parse(&frames[0]), LinkCommand::LinkDown);
    }

    #[test]
    fn test_unknown_command_is_valid_but_ignored() {
        let mut framer = CommandFramer::new();
        let frames = feed(&mut framer, &framed(b"IND=BATTERY=87"));

        assert_eq!(frames.len(), 1);
        assert_eq!(
            LinkCommand::parse(&frames[0]),
            LinkCommand::Other("IND=BATTERY=87".to_string())
        );
    }

    #[test]
    fn test_noise_before_start_marker_ignored() {
        let mut framer = CommandFramer::new();
        let mut bytes = vec![0x00, 0x42, 0xF5, 0x99];
        bytes.extend_from_slice(&framed(b"IND=BLECONNECTED"));
        let frames = feed(&mut framer, &bytes);

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].text(), "IND=BLECONNECTED");
    }

    #[test]
    fn test_overflow_discards_and_resyncs() {
        let mut framer = CommandFramer::new();

        // Payload más largo que la capacidad: ninguna trama sale
        let oversized = framed(&[b'A'; COMMAND_CAPACITY + 8]);
        let frames = feed(&mut framer, &oversized);
        assert!(frames.is_empty());
        assert_eq!(framer.state(), "SCANNING");

        // La máquina resincroniza con la próxima trama válida
        let frames = feed(&mut framer, &framed(b"IND=BLECONNECTED"));
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn test_nul_terminated_text() {
        let mut framer = CommandFramer::new();
        let frames = feed(&mut framer, &framed(b"CMD\0basura"));
        assert_eq!(frames[0].text(), "CMD");
    }

    #[test]
    fn test_streamer_cadence() {
        let (tx, rx) = bounded(64);
        let mut streamer = StrokeStreamer::new(tx);

        // 32 ciclos con enlace: exactamente 2 registros
        for _ in 0..32 {
            streamer.on_cycle(true, || StrokeWireRecord::snapshot(0, &[]));
        }
        assert_eq!(rx.len(), 2);
    }

    #[test]
    fn test_streamer_emits_immediately_after_relink() {
        let (tx, rx) = bounded(64);
        let mut streamer = StrokeStreamer::new(tx);

        for _ in 0..5 {
            streamer.on_cycle(true, || StrokeWireRecord::snapshot(0, &[]));
        }
        assert_eq!(rx.len(), 1);

        // Sin enlace el contador se reinicia
        for _ in 0..3 {
            assert!(!streamer.on_cycle(false, || StrokeWireRecord::snapshot(0, &[])));
        }

        // El primer ciclo tras reconectar emite de inmediato
        assert!(streamer.on_cycle(true, || StrokeWireRecord::snapshot(0, &[])));
        assert_eq!(rx.len(), 2);
    }

    #[test]
    fn test_streamer_drops_on_backpressure() {
        let (tx, rx) = bounded(1);
        let mut streamer = StrokeStreamer::new(tx);

        for _ in 0..64 {
            streamer.on_cycle(true, || StrokeWireRecord::snapshot(0, &[]));
        }
        // Canal de capacidad 1: el excedente se descartó sin bloquear
        assert_eq!(rx.len(), 1);
    }
}
