//! Lunar-solar perturbations and geopotential resonance for orbits with
//! periods of 225 minutes or more.

use std::f64::consts::{PI, TAU};

use super::orbit::{xke, X2O3};

const ZNS: f64 = 1.19459e-5;
const ZNL: f64 = 1.5835218e-4;
const ZES: f64 = 0.01675;
const ZEL: f64 = 0.05490;
const C1SS: f64 = 2.9864797e-6;
const C1L: f64 = 4.7968065e-7;
const ZSINIS: f64 = 0.39785416;
const ZCOSIS: f64 = 0.91744867;
const ZCOSGS: f64 = 0.1945905;
const ZSINGS: f64 = -0.98088458;
/// Earth rotation rate, rad/min.
const RPTIM: f64 = 4.375_269_088_011_299_66e-3;
/// Inclinations this close to 0 or 180 degrees drop the node terms.
const NEAR_EQUATORIAL: f64 = 5.2359877e-2;
const STEP: f64 = 720.0;
const STEP2: f64 = 259_200.0;

/// Mean elements carried through the secular and periodic updates (radians, rad/min).
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct MeanElements {
    pub ecc: f64,
    pub argp: f64,
    pub incl: f64,
    pub mean_anomaly: f64,
    pub node: f64,
    pub mean_motion: f64,
}

/// Geometry of one perturbing body projected onto the orbit.
#[derive(Debug, Clone, Copy, Default)]
struct BodyTerms {
    s1: f64,
    s2: f64,
    s3: f64,
    s4: f64,
    s5: f64,
    s6: f64,
    s7: f64,
    z1: f64,
    z2: f64,
    z3: f64,
    z11: f64,
    z12: f64,
    z13: f64,
    z21: f64,
    z22: f64,
    z23: f64,
    z31: f64,
    z32: f64,
    z33: f64,
}

struct BodyAngles {
    zcosg: f64,
    zsing: f64,
    zcosi: f64,
    zsini: f64,
    zcosh: f64,
    zsinh: f64,
    cc: f64,
}

struct OrbitAngles {
    sinim: f64,
    cosim: f64,
    sinomm: f64,
    cosomm: f64,
    em: f64,
    emsq: f64,
    xnoi: f64,
}

impl BodyTerms {
    fn new(body: &BodyAngles, orbit: &OrbitAngles) -> Self {
        let (sinim, cosim) = (orbit.sinim, orbit.cosim);
        let (sinomm, cosomm) = (orbit.sinomm, orbit.cosomm);
        let emsq = orbit.emsq;
        let betasq = 1.0 - emsq;
        let rtemsq = betasq.sqrt();

        let a1 = body.zcosg * body.zcosh + body.zsing * body.zcosi * body.zsinh;
        let a3 = -body.zsing * body.zcosh + body.zcosg * body.zcosi * body.zsinh;
        let a7 = -body.zcosg * body.zsinh + body.zsing * body.zcosi * body.zcosh;
        let a8 = body.zsing * body.zsini;
        let a9 = body.zsing * body.zsinh + body.zcosg * body.zcosi * body.zcosh;
        let a10 = body.zcosg * body.zsini;
        let a2 = cosim * a7 + sinim * a8;
        let a4 = cosim * a9 + sinim * a10;
        let a5 = -sinim * a7 + cosim * a8;
        let a6 = -sinim * a9 + cosim * a10;

        let x1 = a1 * cosomm + a2 * sinomm;
        let x2 = a3 * cosomm + a4 * sinomm;
        let x3 = -a1 * sinomm + a2 * cosomm;
        let x4 = -a3 * sinomm + a4 * cosomm;
        let x5 = a5 * sinomm;
        let x6 = a6 * sinomm;
        let x7 = a5 * cosomm;
        let x8 = a6 * cosomm;

        let z31 = 12.0 * x1 * x1 - 3.0 * x3 * x3;
        let z32 = 24.0 * x1 * x2 - 6.0 * x3 * x4;
        let z33 = 12.0 * x2 * x2 - 3.0 * x4 * x4;
        let z1 = 3.0 * (a1 * a1 + a2 * a2) + z31 * emsq;
        let z2 = 6.0 * (a1 * a3 + a2 * a4) + z32 * emsq;
        let z3 = 3.0 * (a3 * a3 + a4 * a4) + z33 * emsq;
        let z11 = -6.0 * a1 * a5 + emsq * (-24.0 * x1 * x7 - 6.0 * x3 * x5);
        let z12 = -6.0 * (a1 * a6 + a3 * a5)
            + emsq * (-24.0 * (x2 * x7 + x1 * x8) - 6.0 * (x3 * x6 + x4 * x5));
        let z13 = -6.0 * a3 * a6 + emsq * (-24.0 * x2 * x8 - 6.0 * x4 * x6);
        let z21 = 6.0 * a2 * a5 + emsq * (24.0 * x1 * x5 - 6.0 * x3 * x7);
        let z22 = 6.0 * (a4 * a5 + a2 * a6)
            + emsq * (24.0 * (x2 * x5 + x1 * x6) - 6.0 * (x4 * x7 + x3 * x8));
        let z23 = 6.0 * a4 * a6 + emsq * (24.0 * x2 * x6 - 6.0 * x4 * x8);

        let s3 = body.cc * orbit.xnoi;
        let s2 = -0.5 * s3 / rtemsq;
        let s4 = s3 * rtemsq;
        Self {
            s1: -15.0 * orbit.em * s4,
            s2,
            s3,
            s4,
            s5: x1 * x3 + x2 * x4,
            s6: x2 * x3 + x1 * x4,
            s7: x2 * x4 - x1 * x3,
            z1: z1 + z1 + betasq * z31,
            z2: z2 + z2 + betasq * z32,
            z3: z3 + z3 + betasq * z33,
            z11,
            z12,
            z13,
            z21,
            z22,
            z23,
            z31,
            z32,
            z33,
        }
    }

    /// Secular rates (e, i, M, ω-without-node-coupling, Ω) from this body.
    fn secular_rates(&self, rate: f64, emsq: f64, incl: f64) -> [f64; 5] {
        let mut dh = -rate * self.s2 * (self.z21 + self.z23);
        if !(NEAR_EQUATORIAL..=PI - NEAR_EQUATORIAL).contains(&incl) {
            dh = 0.0;
        }
        [
            self.s1 * rate * self.s5,
            self.s2 * rate * (self.z11 + self.z13),
            -rate * self.s3 * (self.z1 + self.z3 - 14.0 - 6.0 * emsq),
            self.s4 * rate * (self.z31 + self.z33 - 6.0),
            dh,
        ]
    }
}

/// Periodic amplitudes of one body and the phase of its mean anomaly at epoch.
#[derive(Debug, Clone)]
struct PeriodicTerms {
    phase: f64,
    rate: f64,
    eccentricity: f64,
    e2: f64,
    e3: f64,
    i2: f64,
    i3: f64,
    l2: f64,
    l3: f64,
    l4: f64,
    gh2: f64,
    gh3: f64,
    gh4: f64,
    h2: f64,
    h3: f64,
}

/// Periodic offsets in e, i, M, ω+Ω coupling and Ω.
#[derive(Debug, Clone, Copy, Default)]
struct PeriodicOffsets {
    e: f64,
    i: f64,
    l: f64,
    gh: f64,
    h: f64,
}

impl PeriodicTerms {
    fn new(b: &BodyTerms, phase: f64, rate: f64, eccentricity: f64, emsq: f64) -> Self {
        Self {
            phase,
            rate,
            eccentricity,
            e2: 2.0 * b.s1 * b.s6,
            e3: 2.0 * b.s1 * b.s7,
            i2: 2.0 * b.s2 * b.z12,
            i3: 2.0 * b.s2 * (b.z13 - b.z11),
            l2: -2.0 * b.s3 * b.z2,
            l3: -2.0 * b.s3 * (b.z3 - b.z1),
            l4: -2.0 * b.s3 * (-21.0 - 9.0 * emsq) * eccentricity,
            gh2: 2.0 * b.s4 * b.z32,
            gh3: 2.0 * b.s4 * (b.z33 - b.z31),
            gh4: -18.0 * b.s4 * eccentricity,
            h2: -2.0 * b.s2 * b.z22,
            h3: -2.0 * b.s2 * (b.z23 - b.z21),
        }
    }

    fn at(&self, t: f64) -> PeriodicOffsets {
        let zm = self.phase + self.rate * t;
        let zf = zm + 2.0 * self.eccentricity * zm.sin();
        let sinzf = zf.sin();
        let f2 = 0.5 * sinzf * sinzf - 0.25;
        let f3 = -0.5 * sinzf * zf.cos();
        PeriodicOffsets {
            e: self.e2 * f2 + self.e3 * f3,
            i: self.i2 * f2 + self.i3 * f3,
            l: self.l2 * f2 + self.l3 * f3 + self.l4 * sinzf,
            gh: self.gh2 * f2 + self.gh3 * f3 + self.gh4 * sinzf,
            h: self.h2 * f2 + self.h3 * f3,
        }
    }
}

#[derive(Debug, Clone)]
enum Resonance {
    None,
    /// Geosynchronous, one revolution per day.
    OneDay { del1: f64, del2: f64, del3: f64 },
    /// Half-day orbits with high eccentricity (Molniya type).
    HalfDay { d: [f64; 10] },
}

#[derive(Debug, Clone)]
pub(crate) struct DeepSpace {
    solar: PeriodicTerms,
    lunar: PeriodicTerms,
    dedt: f64,
    didt: f64,
    dmdt: f64,
    domdt: f64,
    dnodt: f64,
    resonance: Resonance,
    xlamo: f64,
    xfact: f64,
    gsto: f64,
    no: f64,
    argpo: f64,
    argpdot: f64,
}

impl DeepSpace {
    pub(crate) fn new(
        epoch_days: f64,
        gsto: f64,
        elements: MeanElements,
        mdot: f64,
        argpdot: f64,
        nodedot: f64,
        xpidot: f64,
    ) -> Self {
        let MeanElements { ecc, argp, incl, mean_anomaly, node, mean_motion: no } = elements;
        let (snodm, cnodm) = node.sin_cos();
        let (sinomm, cosomm) = argp.sin_cos();
        let (sinim, cosim) = incl.sin_cos();
        let emsq = ecc * ecc;
        let orbit = OrbitAngles { sinim, cosim, sinomm, cosomm, em: ecc, emsq, xnoi: 1.0 / no };

        // Lunar node and argument at epoch.
        let day = epoch_days + 18_261.5;
        let xnodce = (4.523_602_0 - 9.242_202_9e-4 * day) % TAU;
        let (stem, ctem) = xnodce.sin_cos();
        let zcosil = 0.91375164 - 0.03568096 * ctem;
        let zsinil = (1.0 - zcosil * zcosil).sqrt();
        let zsinhl = 0.089683511 * stem / zsinil;
        let zcoshl = (1.0 - zsinhl * zsinhl).sqrt();
        let gam = 5.8351514 + 0.0019443680 * day;
        let zx = 0.39785416 * stem / zsinil;
        let zy = zcoshl * ctem + 0.91744867 * zsinhl * stem;
        let zx = gam + zx.atan2(zy) - xnodce;
        let (zsingl, zcosgl) = zx.sin_cos();

        let sun = BodyTerms::new(
            &BodyAngles {
                zcosg: ZCOSGS,
                zsing: ZSINGS,
                zcosi: ZCOSIS,
                zsini: ZSINIS,
                zcosh: cnodm,
                zsinh: snodm,
                cc: C1SS,
            },
            &orbit,
        );
        let moon = BodyTerms::new(
            &BodyAngles {
                zcosg: zcosgl,
                zsing: zsingl,
                zcosi: zcosil,
                zsini: zsinil,
                zcosh: zcoshl * cnodm + zsinhl * snodm,
                zsinh: snodm * zcoshl - cnodm * zsinhl,
                cc: C1L,
            },
            &orbit,
        );

        let zmol = (4.7199672 + 0.22997150 * day - gam) % TAU;
        let zmos = (6.2565837 + 0.017201977 * day) % TAU;
        let solar = PeriodicTerms::new(&sun, zmos, ZNS, ZES, emsq);
        let lunar = PeriodicTerms::new(&moon, zmol, ZNL, ZEL, emsq);

        // Secular lunar-solar rates.
        let [ses, sis, sls, sghs, mut shs] = sun.secular_rates(ZNS, emsq, incl);
        let [sel, sil, sll, sghl, mut shll] = moon.secular_rates(ZNL, emsq, incl);
        if sinim != 0.0 {
            shs /= sinim;
            shll /= sinim;
        }
        let dedt = ses + sel;
        let didt = sis + sil;
        let dmdt = sls + sll;
        let domdt = sghs - cosim * shs + sghl - cosim * shll;
        let dnodt = shs + shll;

        // Geopotential resonance.
        let theta = gsto % TAU;
        let aonv = (no / xke()).powf(X2O3);
        let (resonance, xlamo, xfact) = if 0.0034906585 < no && no < 0.0052359877 {
            let g200 = 1.0 + emsq * (-2.5 + 0.8125 * emsq);
            let g310 = 1.0 + 2.0 * emsq;
            let g300 = 1.0 + emsq * (-6.0 + 6.60937 * emsq);
            let f220 = 0.75 * (1.0 + cosim) * (1.0 + cosim);
            let f311 = 0.9375 * sinim * sinim * (1.0 + 3.0 * cosim) - 0.75 * (1.0 + cosim);
            let f330 = 1.875 * (1.0 + cosim).powi(3);
            let del1 = 3.0 * no * no * aonv * aonv;
            let del2 = 2.0 * del1 * f220 * g200 * 1.7891679e-6;
            let del3 = 3.0 * del1 * f330 * g300 * 2.2123015e-7 * aonv;
            let del1 = del1 * f311 * g310 * 2.1460748e-6 * aonv;
            (
                Resonance::OneDay { del1, del2, del3 },
                (mean_anomaly + node + argp - theta) % TAU,
                mdot + xpidot - RPTIM + dmdt + domdt + dnodt - no,
            )
        } else if (8.26e-3..=9.24e-3).contains(&no) && ecc >= 0.5 {
            (
                Resonance::HalfDay { d: half_day_coefficients(ecc, sinim, cosim, no, aonv) },
                (mean_anomaly + node + node - theta - theta) % TAU,
                mdot + dmdt + 2.0 * (nodedot + dnodt - RPTIM) - no,
            )
        } else {
            (Resonance::None, 0.0, 0.0)
        };

        Self {
            solar,
            lunar,
            dedt,
            didt,
            dmdt,
            domdt,
            dnodt,
            resonance,
            xlamo,
            xfact,
            gsto,
            no,
            argpo: argp,
            argpdot,
        }
    }

    /// Applies secular lunar-solar drift and integrates the resonance terms to `t` minutes.
    pub(crate) fn secular(&self, t: f64, mut m: MeanElements) -> MeanElements {
        m.ecc += self.dedt * t;
        m.incl += self.didt * t;
        m.argp += self.domdt * t;
        m.node += self.dnodt * t;
        m.mean_anomaly += self.dmdt * t;
        m.mean_motion = self.no;
        if matches!(self.resonance, Resonance::None) {
            return m;
        }

        // Fixed 720-minute steps from epoch, then a Taylor step to `t`.
        let theta = (self.gsto + t * RPTIM) % TAU;
        let delt = if t > 0.0 { STEP } else { -STEP };
        let mut atime = 0.0;
        let mut xni = self.no;
        let mut xli = self.xlamo;
        let (ft, xldot, xndt, xnddt) = loop {
            let (xndt, xnddt) = self.resonance_rates(xli, atime);
            let xldot = xni + self.xfact;
            let xnddt = xnddt * xldot;
            if (t - atime).abs() >= STEP {
                xli += xldot * delt + xndt * STEP2;
                xni += xndt * delt + xnddt * STEP2;
                atime += delt;
            } else {
                break (t - atime, xldot, xndt, xnddt);
            }
        };
        m.mean_motion = xni + xndt * ft + xnddt * ft * ft * 0.5;
        let xl = xli + xldot * ft + xndt * ft * ft * 0.5;
        m.mean_anomaly = match self.resonance {
            Resonance::OneDay { .. } => xl - m.node - m.argp + theta,
            _ => xl - 2.0 * m.node + 2.0 * theta,
        };
        m
    }

    /// First and (unscaled) second derivative of the resonant mean motion.
    fn resonance_rates(&self, xli: f64, atime: f64) -> (f64, f64) {
        const FASX2: f64 = 0.13130908;
        const FASX4: f64 = 2.8843198;
        const FASX6: f64 = 0.37448087;
        const G22: f64 = 5.7686396;
        const G32: f64 = 0.95240898;
        const G44: f64 = 1.8014998;
        const G52: f64 = 1.0508330;
        const G54: f64 = 4.4108898;

        match &self.resonance {
            Resonance::None => (0.0, 0.0),
            Resonance::OneDay { del1, del2, del3 } => {
                let xndt = del1 * (xli - FASX2).sin()
                    + del2 * (2.0 * (xli - FASX4)).sin()
                    + del3 * (3.0 * (xli - FASX6)).sin();
                let xnddt = del1 * (xli - FASX2).cos()
                    + 2.0 * del2 * (2.0 * (xli - FASX4)).cos()
                    + 3.0 * del3 * (3.0 * (xli - FASX6)).cos();
                (xndt, xnddt)
            }
            Resonance::HalfDay { d } => {
                let [d2201, d2211, d3210, d3222, d4410, d4422, d5220, d5232, d5421, d5433] = *d;
                let xomi = self.argpo + self.argpdot * atime;
                let x2omi = xomi + xomi;
                let x2li = xli + xli;
                let xndt = d2201 * (x2omi + xli - G22).sin()
                    + d2211 * (xli - G22).sin()
                    + d3210 * (xomi + xli - G32).sin()
                    + d3222 * (-xomi + xli - G32).sin()
                    + d4410 * (x2omi + x2li - G44).sin()
                    + d4422 * (x2li - G44).sin()
                    + d5220 * (xomi + xli - G52).sin()
                    + d5232 * (-xomi + xli - G52).sin()
                    + d5421 * (xomi + x2li - G54).sin()
                    + d5433 * (-xomi + x2li - G54).sin();
                let xnddt = d2201 * (x2omi + xli - G22).cos()
                    + d2211 * (xli - G22).cos()
                    + d3210 * (xomi + xli - G32).cos()
                    + d3222 * (-xomi + xli - G32).cos()
                    + d5220 * (xomi + xli - G52).cos()
                    + d5232 * (-xomi + xli - G52).cos()
                    + 2.0
                        * (d4410 * (x2omi + x2li - G44).cos()
                            + d4422 * (x2li - G44).cos()
                            + d5421 * (xomi + x2li - G54).cos()
                            + d5433 * (-xomi + x2li - G54).cos());
                (xndt, xnddt)
            }
        }
    }

    /// Adds lunar-solar periodic terms to osculating elements at `t` minutes.
    pub(crate) fn periodics(&self, t: f64, mut m: MeanElements) -> MeanElements {
        let sun = self.solar.at(t);
        let moon = self.lunar.at(t);
        let pe = sun.e + moon.e;
        let pinc = sun.i + moon.i;
        let pl = sun.l + moon.l;
        let mut pgh = sun.gh + moon.gh;
        let mut ph = sun.h + moon.h;

        m.incl += pinc;
        m.ecc += pe;
        let (sinip, cosip) = m.incl.sin_cos();

        if m.incl >= 0.2 {
            ph /= sinip;
            pgh -= cosip * ph;
            m.argp += pgh;
            m.node += ph;
            m.mean_anomaly += pl;
        } else {
            // Lyddane modification for low inclinations.
            let (sinop, cosop) = m.node.sin_cos();
            let alfdp = sinip * sinop + (ph * cosop + pinc * cosip * sinop);
            let betdp = sinip * cosop + (-ph * sinop + pinc * cosip * cosop);
            let mut nodep = m.node % TAU;
            if nodep < 0.0 {
                nodep += TAU;
            }
            let xls = m.mean_anomaly + m.argp + cosip * nodep + pl + pgh - pinc * nodep * sinip;
            let xnoh = nodep;
            nodep = alfdp.atan2(betdp);
            if nodep < 0.0 {
                nodep += TAU;
            }
            if (xnoh - nodep).abs() > PI {
                if nodep < xnoh {
                    nodep += TAU;
                } else {
                    nodep -= TAU;
                }
            }
            m.mean_anomaly += pl;
            m.node = nodep;
            m.argp = xls - m.mean_anomaly - cosip * nodep;
        }
        m
    }
}

fn half_day_coefficients(em: f64, sinim: f64, cosim: f64, nm: f64, aonv: f64) -> [f64; 10] {
    const ROOT22: f64 = 1.7891679e-6;
    const ROOT32: f64 = 3.7393792e-7;
    const ROOT44: f64 = 7.3636953e-9;
    const ROOT52: f64 = 1.1428639e-7;
    const ROOT54: f64 = 2.1765803e-9;

    let cosisq = cosim * cosim;
    let emsq = em * em;
    let eoc = em * emsq;
    let g201 = -0.306 - (em - 0.64) * 0.440;
    let (g211, g310, g322, g410, g422, g520);
    if em <= 0.65 {
        g211 = 3.616 - 13.2470 * em + 16.2900 * emsq;
        g310 = -19.302 + 117.3900 * em - 228.4190 * emsq + 156.5910 * eoc;
        g322 = -18.9068 + 109.7927 * em - 214.6334 * emsq + 146.5816 * eoc;
        g410 = -41.122 + 242.6940 * em - 471.0940 * emsq + 313.9530 * eoc;
        g422 = -146.407 + 841.8800 * em - 1629.014 * emsq + 1083.4350 * eoc;
        g520 = -532.114 + 3017.977 * em - 5740.032 * emsq + 3708.2760 * eoc;
    } else {
        g211 = -72.099 + 331.819 * em - 508.738 * emsq + 266.724 * eoc;
        g310 = -346.844 + 1582.851 * em - 2415.925 * emsq + 1246.113 * eoc;
        g322 = -342.585 + 1554.908 * em - 2366.899 * emsq + 1215.972 * eoc;
        g410 = -1052.797 + 4758.686 * em - 7193.992 * emsq + 3651.957 * eoc;
        g422 = -3581.690 + 16178.110 * em - 24462.770 * emsq + 12422.520 * eoc;
        g520 = if em > 0.715 {
            -5149.66 + 29936.92 * em - 54087.36 * emsq + 31324.56 * eoc
        } else {
            1464.74 - 4664.75 * em + 3763.64 * emsq
        };
    }
    let (g533, g521, g532) = if em < 0.7 {
        (
            -919.22770 + 4988.6100 * em - 9064.7700 * emsq + 5542.21 * eoc,
            -822.71072 + 4568.6173 * em - 8491.4146 * emsq + 5337.524 * eoc,
            -853.66600 + 4690.2500 * em - 8624.7700 * emsq + 5341.4 * eoc,
        )
    } else {
        (
            -37995.780 + 161616.52 * em - 229838.20 * emsq + 109377.94 * eoc,
            -51752.104 + 218913.95 * em - 309468.16 * emsq + 146349.42 * eoc,
            -40023.880 + 170470.89 * em - 242699.48 * emsq + 115605.82 * eoc,
        )
    };

    let sini2 = sinim * sinim;
    let f220 = 0.75 * (1.0 + 2.0 * cosim + cosisq);
    let f221 = 1.5 * sini2;
    let f321 = 1.875 * sinim * (1.0 - 2.0 * cosim - 3.0 * cosisq);
    let f322 = -1.875 * sinim * (1.0 + 2.0 * cosim - 3.0 * cosisq);
    let f441 = 35.0 * sini2 * f220;
    let f442 = 39.3750 * sini2 * sini2;
    let f522 = 9.84375
        * sinim
        * (sini2 * (1.0 - 2.0 * cosim - 5.0 * cosisq)
            + 0.33333333 * (-2.0 + 4.0 * cosim + 6.0 * cosisq));
    let f523 = sinim
        * (4.92187512 * sini2 * (-2.0 - 4.0 * cosim + 10.0 * cosisq)
            + 6.56250012 * (1.0 + 2.0 * cosim - 3.0 * cosisq));
    let f542 =
        29.53125 * sinim * (2.0 - 8.0 * cosim + cosisq * (-12.0 + 8.0 * cosim + 10.0 * cosisq));
    let f543 =
        29.53125 * sinim * (-2.0 - 8.0 * cosim + cosisq * (12.0 + 8.0 * cosim - 10.0 * cosisq));

    let ainv2 = aonv * aonv;
    let mut temp1 = 3.0 * nm * nm * ainv2;
    let mut temp = temp1 * ROOT22;
    let d2201 = temp * f220 * g201;
    let d2211 = temp * f221 * g211;
    temp1 *= aonv;
    temp = temp1 * ROOT32;
    let d3210 = temp * f321 * g310;
    let d3222 = temp * f322 * g322;
    temp1 *= aonv;
    temp = 2.0 * temp1 * ROOT44;
    let d4410 = temp * f441 * g410;
    let d4422 = temp * f442 * g422;
    temp1 *= aonv;
    temp = temp1 * ROOT52;
    let d5220 = temp * f522 * g520;
    let d5232 = temp * f523 * g532;
    temp = 2.0 * temp1 * ROOT54;
    let d5421 = temp * f542 * g521;
    let d5433 = temp * f543 * g533;

    [d2201, d2211, d3210, d3222, d4410, d4422, d5220, d5232, d5421, d5433]
}
