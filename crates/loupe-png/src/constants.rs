/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

pub const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

/// Column and row of the first pixel of each Adam7 pass
pub const ADAM7_X_START: [usize; 7] = [0, 4, 0, 2, 0, 1, 0];
pub const ADAM7_Y_START: [usize; 7] = [0, 0, 4, 0, 2, 0, 1];

/// Distance between pixels of each Adam7 pass
pub const ADAM7_X_STEP: [usize; 7] = [8, 8, 4, 4, 2, 2, 1];
pub const ADAM7_Y_STEP: [usize; 7] = [8, 8, 8, 4, 4, 2, 2];
