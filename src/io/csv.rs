use std::io::{self, Write};

use crate::eigenray::Eigenray;
use crate::geo::EarthModel;
use crate::sim::{Wavefront, WavefrontObserver};

// ---------------------------------------------------------------------------
// Eigenray tables
// ---------------------------------------------------------------------------

/// Write an eigenray list as CSV.
///
/// Columns: time, intensity, phase, s_de, s_az, t_de, t_az, srf, btm, cst.
/// Intensity and phase are taken at frequency index `freq`.
pub fn write_eigenrays<W: Write>(writer: &mut W, rays: &[Eigenray], freq: usize) -> io::Result<()> {
    writeln!(writer, "time,intensity,phase,s_de,s_az,t_de,t_az,srf,btm,cst")?;
    for r in rays {
        let intensity = r.intensity.get(freq).copied().unwrap_or(f64::NAN);
        let phase = r.phase.get(freq).copied().unwrap_or(f64::NAN);
        writeln!(
            writer,
            "{:.6},{:.2},{:.4},{:.4},{:.4},{:.4},{:.4},{},{},{}",
            r.time, intensity, phase, r.source_de, r.source_az, r.target_de, r.target_az, r.surface, r.bottom, r.caustic,
        )?;
    }
    Ok(())
}

/// Write an eigenray list to a CSV file at the given path.
pub fn write_eigenrays_file(path: &str, rays: &[Eigenray], freq: usize) -> io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    write_eigenrays(&mut file, rays, freq)
}

// ---------------------------------------------------------------------------
// Wavefront recording
// ---------------------------------------------------------------------------

/// Observer that writes every live ray of every layer as one CSV row.
///
/// Columns: time, de_idx, az_idx, latitude, longitude, altitude, srf, btm, cst
///
/// The first write error stops recording; [`WavefrontRecorder::finish`]
/// reports it.
pub struct WavefrontRecorder<W: Write> {
    writer: W,
    earth: EarthModel,
    rows: usize,
    error: Option<io::Error>,
    header_written: bool,
}

impl<W: Write> WavefrontRecorder<W> {
    pub fn new(writer: W, earth: EarthModel) -> Self {
        Self { writer, earth, rows: 0, error: None, header_written: false }
    }

    /// Rows written so far, header excluded.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Flush and hand back the writer, or the first error seen.
    pub fn finish(mut self) -> io::Result<W> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        self.writer.flush()?;
        Ok(self.writer)
    }

    fn write_layer(&mut self, wave: &Wavefront) -> io::Result<()> {
        if !self.header_written {
            writeln!(self.writer, "time,de_idx,az_idx,latitude,longitude,altitude,srf,btm,cst")?;
            self.header_written = true;
        }
        for (i, j, cell) in wave.iter() {
            let Some(ray) = cell.alive() else { continue };
            let p = self.earth.to_geo(ray.pos());
            writeln!(
                self.writer,
                "{:.4},{},{},{:.8},{:.8},{:.3},{},{},{}",
                ray.time(),
                i,
                j,
                p.latitude,
                p.longitude,
                p.altitude,
                ray.surface,
                ray.bottom,
                ray.caustic,
            )?;
            self.rows += 1;
        }
        Ok(())
    }
}

impl<W: Write> WavefrontObserver for WavefrontRecorder<W> {
    fn observe(&mut self, wave: &Wavefront) {
        if self.error.is_some() {
            return;
        }
        if let Err(e) = self.write_layer(wave) {
            tracing::warn!(error = %e, "wavefront recording stopped");
            self.error = Some(e);
        }
    }
}
