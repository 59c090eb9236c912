//! Closed vocabularies shared by the registry, the configuration and the
//! Engine Link: buttons, game variables, screen geometry and control modes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Engine tic rate in tics per second.
pub const TICRATE: u32 = 35;

/// Convert a tic count to wall-clock milliseconds at the engine tic rate.
pub fn doom_tics_to_ms(tics: u32) -> u32 {
    let ms = u64::from(tics) * 1000 / u64::from(TICRATE);
    u32::try_from(ms).unwrap_or(u32::MAX)
}

/// Convert milliseconds to the smallest tic count covering them.
pub fn ms_to_doom_tics(ms: u32) -> u32 {
    let scaled = u64::from(ms) * u64::from(TICRATE);
    u32::try_from(scaled.div_ceil(1000)).unwrap_or(u32::MAX)
}

/// Interpret an engine 16.16 fixed-point value.
pub fn doom_fixed_to_float(value: i32) -> f64 {
    f64::from(value) / 65536.0
}

macro_rules! vocabulary {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Every value in engine order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];
            /// Number of values in the vocabulary.
            pub const COUNT: usize = Self::ALL.len();

            /// Slot of this value in engine-side buffers.
            pub const fn index(self) -> usize {
                self as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Debug::fmt(self, f)
            }
        }
    };
}

vocabulary! {
    /// Control inputs understood by the engine.
    ///
    /// The five `*Delta` buttons are analog: they carry a signed magnitude
    /// instead of a pressed/released flag.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
    pub enum Button {
        Attack,
        Use,
        Jump,
        Crouch,
        Turn180,
        AltAttack,
        Reload,
        Zoom,
        Speed,
        Strafe,
        MoveRight,
        MoveLeft,
        MoveBackward,
        MoveForward,
        TurnRight,
        TurnLeft,
        LookUp,
        LookDown,
        MoveUp,
        MoveDown,
        Land,
        SelectWeapon1,
        SelectWeapon2,
        SelectWeapon3,
        SelectWeapon4,
        SelectWeapon5,
        SelectWeapon6,
        SelectWeapon7,
        SelectWeapon8,
        SelectWeapon9,
        SelectWeapon0,
        SelectNextWeapon,
        SelectPrevWeapon,
        DropSelectedWeapon,
        ActivateSelectedItem,
        SelectNextItem,
        SelectPrevItem,
        DropSelectedItem,
        LookUpDownDelta,
        TurnLeftRightDelta,
        MoveForwardBackwardDelta,
        MoveLeftRightDelta,
        MoveUpDownDelta,
    }
}

impl Button {
    /// Whether the button carries a signed analog magnitude.
    pub const fn is_delta(self) -> bool {
        matches!(
            self,
            Button::LookUpDownDelta
                | Button::TurnLeftRightDelta
                | Button::MoveForwardBackwardDelta
                | Button::MoveLeftRightDelta
                | Button::MoveUpDownDelta
        )
    }
}

vocabulary! {
    /// Observable values exported by the engine every tic.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
    pub enum GameVariable {
        #[serde(rename = "KILLCOUNT")]
        KillCount,
        #[serde(rename = "ITEMCOUNT")]
        ItemCount,
        #[serde(rename = "SECRETCOUNT")]
        SecretCount,
        #[serde(rename = "FRAGCOUNT")]
        FragCount,
        Health,
        Armor,
        Dead,
        OnGround,
        AttackReady,
        AltAttackReady,
        SelectedWeapon,
        SelectedWeaponAmmo,
        Ammo0,
        Ammo1,
        Ammo2,
        Ammo3,
        Ammo4,
        Ammo5,
        Ammo6,
        Ammo7,
        Ammo8,
        Ammo9,
        Weapon0,
        Weapon1,
        Weapon2,
        Weapon3,
        Weapon4,
        Weapon5,
        Weapon6,
        Weapon7,
        Weapon8,
        Weapon9,
        PositionX,
        PositionY,
        PositionZ,
        User1,
        User2,
        User3,
        User4,
        User5,
        User6,
        User7,
        User8,
        User9,
        User10,
        User11,
        User12,
        User13,
        User14,
        User15,
        User16,
        User17,
        User18,
        User19,
        User20,
        User21,
        User22,
        User23,
        User24,
        User25,
        User26,
        User27,
        User28,
        User29,
        User30,
    }
}

/// Layout of the pixels in a frame buffer.
///
/// Planar formats (`CRCGCB`, `CBCGCR` and their depth variants) store one
/// full plane per channel; the rest interleave channels per pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScreenFormat {
    Crcgcb,
    Crcgcbzb,
    #[default]
    Rgb24,
    Rgba32,
    Argb32,
    Cbcgcr,
    Cbcgcrzb,
    Bgr24,
    Bgra32,
    Abgr32,
    Gray8,
    Zbuffer8,
    #[serde(rename = "DOOM_256_COLORS")]
    Doom256Colors,
}

impl ScreenFormat {
    pub const fn channels(self) -> usize {
        match self {
            ScreenFormat::Crcgcb | ScreenFormat::Cbcgcr | ScreenFormat::Rgb24 | ScreenFormat::Bgr24 => 3,
            ScreenFormat::Crcgcbzb
            | ScreenFormat::Cbcgcrzb
            | ScreenFormat::Rgba32
            | ScreenFormat::Argb32
            | ScreenFormat::Bgra32
            | ScreenFormat::Abgr32 => 4,
            ScreenFormat::Gray8 | ScreenFormat::Zbuffer8 | ScreenFormat::Doom256Colors => 1,
        }
    }

    pub const fn is_planar(self) -> bool {
        matches!(
            self,
            ScreenFormat::Crcgcb
                | ScreenFormat::Crcgcbzb
                | ScreenFormat::Cbcgcr
                | ScreenFormat::Cbcgcrzb
        )
    }

    /// Bytes between the starts of two consecutive rows.
    pub const fn pitch(self, width: usize) -> usize {
        if self.is_planar() {
            width
        } else {
            width * self.channels()
        }
    }
}

/// Rendering resolutions accepted by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ScreenResolution {
    #[serde(rename = "RES_160X120")]
    Res160x120,
    #[serde(rename = "RES_200X125")]
    Res200x125,
    #[serde(rename = "RES_200X150")]
    Res200x150,
    #[serde(rename = "RES_256X144")]
    Res256x144,
    #[serde(rename = "RES_256X160")]
    Res256x160,
    #[serde(rename = "RES_256X192")]
    Res256x192,
    #[serde(rename = "RES_320X180")]
    Res320x180,
    #[serde(rename = "RES_320X200")]
    Res320x200,
    #[default]
    #[serde(rename = "RES_320X240")]
    Res320x240,
    #[serde(rename = "RES_400X225")]
    Res400x225,
    #[serde(rename = "RES_400X300")]
    Res400x300,
    #[serde(rename = "RES_512X288")]
    Res512x288,
    #[serde(rename = "RES_512X384")]
    Res512x384,
    #[serde(rename = "RES_640X360")]
    Res640x360,
    #[serde(rename = "RES_640X400")]
    Res640x400,
    #[serde(rename = "RES_640X480")]
    Res640x480,
    #[serde(rename = "RES_800X450")]
    Res800x450,
    #[serde(rename = "RES_800X600")]
    Res800x600,
    #[serde(rename = "RES_1024X576")]
    Res1024x576,
    #[serde(rename = "RES_1024X768")]
    Res1024x768,
    #[serde(rename = "RES_1280X720")]
    Res1280x720,
    #[serde(rename = "RES_1280X960")]
    Res1280x960,
    #[serde(rename = "RES_1600X1200")]
    Res1600x1200,
    #[serde(rename = "RES_1920X1080")]
    Res1920x1080,
}

impl ScreenResolution {
    /// `(width, height)` in pixels.
    pub const fn dimensions(self) -> (usize, usize) {
        match self {
            ScreenResolution::Res160x120 => (160, 120),
            ScreenResolution::Res200x125 => (200, 125),
            ScreenResolution::Res200x150 => (200, 150),
            ScreenResolution::Res256x144 => (256, 144),
            ScreenResolution::Res256x160 => (256, 160),
            ScreenResolution::Res256x192 => (256, 192),
            ScreenResolution::Res320x180 => (320, 180),
            ScreenResolution::Res320x200 => (320, 200),
            ScreenResolution::Res320x240 => (320, 240),
            ScreenResolution::Res400x225 => (400, 225),
            ScreenResolution::Res400x300 => (400, 300),
            ScreenResolution::Res512x288 => (512, 288),
            ScreenResolution::Res512x384 => (512, 384),
            ScreenResolution::Res640x360 => (640, 360),
            ScreenResolution::Res640x400 => (640, 400),
            ScreenResolution::Res640x480 => (640, 480),
            ScreenResolution::Res800x450 => (800, 450),
            ScreenResolution::Res800x600 => (800, 600),
            ScreenResolution::Res1024x576 => (1024, 576),
            ScreenResolution::Res1024x768 => (1024, 768),
            ScreenResolution::Res1280x720 => (1280, 720),
            ScreenResolution::Res1280x960 => (1280, 960),
            ScreenResolution::Res1600x1200 => (1600, 1200),
            ScreenResolution::Res1920x1080 => (1920, 1080),
        }
    }
}

/// Who drives the player and how tightly the caller is coupled to engine time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mode {
    /// Caller supplies actions; every advance blocks for exactly the requested tics.
    #[default]
    Player,
    /// A human plays; the caller observes tic-exactly.
    Spectator,
    /// Caller supplies actions while the engine free-runs.
    AsyncPlayer,
    /// A human plays while the engine free-runs.
    AsyncSpectator,
}

impl Mode {
    pub const fn is_synchronous(self) -> bool {
        matches!(self, Mode::Player | Mode::Spectator)
    }

    pub const fn accepts_actions(self) -> bool {
        matches!(self, Mode::Player | Mode::AsyncPlayer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tic_conversions_round_in_the_right_direction() {
        assert_eq!(doom_tics_to_ms(35), 1000);
        assert_eq!(doom_tics_to_ms(1), 28);
        assert_eq!(ms_to_doom_tics(1000), 35);
        assert_eq!(ms_to_doom_tics(1), 1);
        assert_eq!(ms_to_doom_tics(0), 0);
    }

    #[test]
    fn tic_conversions_saturate_instead_of_wrapping() {
        assert_eq!(doom_tics_to_ms(u32::MAX), u32::MAX);
        assert_eq!(doom_tics_to_ms(200_000_000), u32::MAX);
        assert_eq!(ms_to_doom_tics(u32::MAX), 150_323_856);
    }

    #[test]
    fn fixed_point_conversion() {
        assert_eq!(doom_fixed_to_float(1 << 16), 1.0);
        assert_eq!(doom_fixed_to_float(-(1 << 15)), -0.5);
    }

    #[test]
    fn vocabulary_indices_follow_declaration_order() {
        assert_eq!(Button::Attack.index(), 0);
        assert_eq!(Button::ALL[Button::MoveForward.index()], Button::MoveForward);
        assert_eq!(Button::COUNT, 43);
        assert_eq!(GameVariable::COUNT, 65);
        assert_eq!(GameVariable::ALL.last(), Some(&GameVariable::User30));
    }

    #[test]
    fn delta_buttons_are_flagged() {
        assert!(Button::TurnLeftRightDelta.is_delta());
        assert!(!Button::TurnLeft.is_delta());
    }

    #[test]
    fn engine_spelling_round_trips_through_serde() {
        let button: Button = serde_json::from_str("\"MOVE_FORWARD\"").unwrap();
        assert_eq!(button, Button::MoveForward);
        let var: GameVariable = serde_json::from_str("\"KILLCOUNT\"").unwrap();
        assert_eq!(var, GameVariable::KillCount);
        let res: ScreenResolution = serde_json::from_str("\"RES_640X480\"").unwrap();
        assert_eq!(res.dimensions(), (640, 480));
        let format: ScreenFormat = serde_json::from_str("\"DOOM_256_COLORS\"").unwrap();
        assert_eq!(format.channels(), 1);
        let mode: Mode = serde_json::from_str("\"ASYNC_SPECTATOR\"").unwrap();
        assert!(!mode.is_synchronous());
        assert!(!mode.accepts_actions());
    }

    #[test]
    fn planar_formats_use_single_channel_pitch() {
        assert_eq!(ScreenFormat::Crcgcb.pitch(320), 320);
        assert_eq!(ScreenFormat::Rgb24.pitch(320), 960);
    }
}
